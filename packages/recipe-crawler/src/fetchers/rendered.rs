//! Rendered-DOM fetcher driving a headless browser over WebDriver.
//!
//! For sites that build their recipe markup with JavaScript. Requires a
//! running WebDriver endpoint (chromedriver, geckodriver, or a Selenium grid).

use std::time::Duration;

use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::PageFetcher;
use crate::error::{CrawlError, CrawlResult};

/// Settings for the rendered fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    /// WebDriver endpoint.
    pub webdriver_url: String,
    /// Upper bound on waiting for the title selector to appear.
    pub wait_timeout: Duration,
    /// Total attempts per URL.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:4444".to_string(),
            wait_timeout: Duration::from_secs(10),
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// Fetches pages through a headless browser session.
///
/// The session is opened lazily on first fetch and reused for the whole crawl;
/// call [`PageFetcher::shutdown`] when done.
pub struct RenderedFetcher {
    settings: RenderSettings,
    wait_selector: Option<String>,
    session: Mutex<Option<Client>>,
}

impl RenderedFetcher {
    /// `wait_selector` is normally the site's title selector.
    pub fn new(settings: RenderSettings, wait_selector: Option<String>) -> Self {
        Self {
            settings,
            wait_selector: wait_selector.filter(|s| !s.trim().is_empty()),
            session: Mutex::new(None),
        }
    }

    async fn client(&self) -> CrawlResult<Client> {
        let mut session = self.session.lock().await;
        if let Some(client) = session.as_ref() {
            return Ok(client.clone());
        }

        let mut capabilities = serde_json::Map::new();
        capabilities.insert(
            "goog:chromeOptions".to_string(),
            json!({ "args": ["--headless", "--disable-gpu", "--no-sandbox"] }),
        );
        capabilities.insert(
            "moz:firefoxOptions".to_string(),
            json!({ "args": ["-headless"] }),
        );

        let mut builder = ClientBuilder::native();
        builder.capabilities(capabilities);
        let client = builder
            .connect(&self.settings.webdriver_url)
            .await
            .map_err(|e| CrawlError::Client(format!("WebDriver session failed: {}", e)))?;

        info!(webdriver = %self.settings.webdriver_url, "Headless browser session started");
        *session = Some(client.clone());
        Ok(client)
    }

    async fn render_once(&self, url: &str) -> CrawlResult<String> {
        let client = self.client().await?;
        let render_err = |e: fantoccini::error::CmdError| CrawlError::fetch(url, 1, e.to_string());

        client.goto(url).await.map_err(render_err)?;

        if let Some(selector) = &self.wait_selector {
            client
                .wait()
                .at_most(self.settings.wait_timeout)
                .for_element(Locator::Css(selector.as_str()))
                .await
                .map_err(render_err)?;
        }

        client.source().await.map_err(render_err)
    }
}

#[async_trait]
impl PageFetcher for RenderedFetcher {
    async fn fetch(&self, url: &str) -> CrawlResult<String> {
        let max_attempts = self.settings.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            debug!(url = %url, attempt, "Rendered fetch starting");
            match self.render_once(url).await {
                Ok(html) => return Ok(html),
                Err(e) if attempt < max_attempts => {
                    warn!(url = %url, attempt, error = %e, "Rendered fetch failed, retrying");
                    tokio::time::sleep(self.settings.retry_delay).await;
                }
                Err(e) => {
                    warn!(url = %url, attempts = attempt, error = %e, "Rendered fetch retry budget exhausted");
                    return Err(CrawlError::fetch(url, attempt, e.to_string()));
                }
            }
        }

        Err(CrawlError::fetch(url, max_attempts, "no attempts made"))
    }

    async fn shutdown(&self) -> CrawlResult<()> {
        if let Some(client) = self.session.lock().await.take() {
            client
                .close()
                .await
                .map_err(|e| CrawlError::Client(format!("failed to close browser session: {}", e)))?;
            info!("Headless browser session closed");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "rendered"
    }
}
