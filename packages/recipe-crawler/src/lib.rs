//! Selector-driven recipe crawling.
//!
//! Turns arbitrary recipe-site HTML into structured [`RecipeRecord`]s. Every
//! site is described by an immutable [`SiteConfig`] of CSS selectors; a single
//! generic crawler and extractor serve all of them.
//!
//! # Usage
//!
//! ```rust,ignore
//! use recipe_crawler::{fetcher_for, FetchSettings, SiteConfig, SiteCrawler};
//!
//! let config = SiteConfig::load("config/sites/foodista.json")?.remove(0);
//! let fetcher = fetcher_for(&config, &FetchSettings::default())?;
//! let summary = SiteCrawler::new(&config, fetcher.as_ref()).crawl(&store).await;
//! ```
//!
//! # Modules
//!
//! - [`types`] - Site configuration and extracted records
//! - [`extractor`] - Selector-based field and link extraction
//! - [`fetchers`] - HTTP (with retry) and rendered-DOM fetch strategies
//! - [`crawler`] - Pagination-aware link discovery and the crawl loop
//! - [`testing`] - Mock fetcher and sink for tests

pub mod crawler;
pub mod error;
pub mod extractor;
pub mod fetchers;
pub mod testing;
pub mod types;

pub use crawler::{CrawlSummary, RecipeSink, SiteCrawler};
pub use error::{CrawlError, CrawlResult};
pub use extractor::{extract_recipe, Extractor};
pub use fetchers::{
    fetcher_for, FetchSettings, HttpFetcher, PageFetcher, RenderSettings, RenderedFetcher,
    RetryPolicy,
};
pub use types::{RecipeRecord, Selectors, SiteConfig, UNTITLED};
