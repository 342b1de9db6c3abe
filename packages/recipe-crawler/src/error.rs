//! Typed errors for the recipe crawler.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so the pipeline crate
//! can tell a failed URL apart from a broken site configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading site configs or crawling.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Retry budget exhausted (or a non-retryable response) for one URL.
    ///
    /// Fatal for that URL only; the crawl continues with the next one.
    #[error("fetch failed for {url} after {attempts} attempt(s): {reason}")]
    Fetch {
        url: String,
        attempts: u32,
        reason: String,
    },

    /// The HTTP client or browser session could not be built.
    #[error("client setup failed: {0}")]
    Client(String),

    /// Invalid URL format
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Site configuration failed validation.
    #[error("invalid site config: {0}")]
    Config(String),

    /// Site configuration file could not be read.
    #[error("failed to read site config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Site configuration was not valid JSON.
    #[error("invalid site config JSON: {0}")]
    ConfigJson(#[from] serde_json::Error),

    /// The recipe sink rejected a record.
    #[error("sink error: {0}")]
    Sink(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl CrawlError {
    pub(crate) fn fetch(url: &str, attempts: u32, reason: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.to_string(),
            attempts,
            reason: reason.into(),
        }
    }
}

/// Result type alias for crawl operations.
pub type CrawlResult<T> = std::result::Result<T, CrawlError>;
