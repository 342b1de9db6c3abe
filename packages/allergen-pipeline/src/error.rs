//! Typed errors for the allergen pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by pipeline components.
///
/// `Storage` is scoped to one write and is logged and skipped by batch
/// callers. `Config` and `Model` are fatal at start-up: nothing proceeds
/// without a dictionary or, for the ML pass, a model artifact.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Constraint violation or connection fault
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Missing or invalid dictionary / configuration
    #[error("config error: {0}")]
    Config(String),

    /// Model artifact missing, malformed, or untrainable
    #[error("model error: {0}")]
    Model(String),

    /// Stored row holds a value outside the schema's domain
    #[error("corrupt row: {0}")]
    CorruptRow(String),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("crawl error: {0}")]
    Crawl(#[from] recipe_crawler::CrawlError),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
