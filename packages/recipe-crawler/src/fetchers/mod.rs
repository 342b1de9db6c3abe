//! Page fetching strategies.
//!
//! - `HttpFetcher` - Direct HTTP GET with bounded exponential-backoff retry
//! - `RenderedFetcher` - Headless browser over WebDriver, waits for the title
//!   selector before reading the DOM
//!
//! Which one a site uses is decided by `SiteConfig::use_rendered_fetch`.

pub mod http;
pub mod rendered;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CrawlResult;
use crate::types::SiteConfig;

pub use http::{HttpFetcher, RetryPolicy};
pub use rendered::{RenderSettings, RenderedFetcher};

/// Fetches the HTML of a single URL.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a page, retrying per the fetcher's policy.
    async fn fetch(&self, url: &str) -> CrawlResult<String>;

    /// Release any session held by the fetcher.
    async fn shutdown(&self) -> CrawlResult<()> {
        Ok(())
    }

    /// Short name for logging.
    fn name(&self) -> &str;
}

/// Settings shared by both fetch strategies.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub http_timeout: Duration,
    pub retry: RetryPolicy,
    pub render: RenderSettings,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            render: RenderSettings::default(),
        }
    }
}

/// Build the fetcher a site config asks for.
pub fn fetcher_for(config: &SiteConfig, settings: &FetchSettings) -> CrawlResult<Box<dyn PageFetcher>> {
    if config.use_rendered_fetch {
        Ok(Box::new(RenderedFetcher::new(
            settings.render.clone(),
            config.selectors.title.clone(),
        )))
    } else {
        Ok(Box::new(
            HttpFetcher::new(settings.http_timeout)?.with_retry_policy(settings.retry.clone()),
        ))
    }
}
