//! Site crawl driver: link discovery with pagination, then fetch → extract →
//! sink for every recipe link.
//!
//! Everything runs sequentially, one page at a time. A failure on one start
//! URL's page chain or on one recipe link is logged and skipped; it never
//! aborts the rest of the crawl.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{CrawlError, CrawlResult};
use crate::extractor::Extractor;
use crate::fetchers::PageFetcher;
use crate::types::{RecipeRecord, SiteConfig};

/// Destination for extracted recipes (normally the recipe store).
#[async_trait]
pub trait RecipeSink: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Persist one fetched recipe page and its extracted record.
    async fn save(&self, url: &str, html: &str, record: &RecipeRecord) -> Result<(), Self::Error>;
}

/// Outcome counters for one site crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub links_found: usize,
    pub saved: usize,
    pub failed: usize,
}

/// Crawls one site described by a [`SiteConfig`].
pub struct SiteCrawler<'a> {
    config: &'a SiteConfig,
    fetcher: &'a dyn PageFetcher,
    extractor: Extractor,
}

impl<'a> SiteCrawler<'a> {
    pub fn new(config: &'a SiteConfig, fetcher: &'a dyn PageFetcher) -> Self {
        Self {
            config,
            fetcher,
            extractor: Extractor::new(config),
        }
    }

    /// Fetch one page's HTML with the site's fetch strategy.
    pub async fn fetch(&self, url: &str) -> CrawlResult<String> {
        self.fetcher.fetch(url).await
    }

    /// Collect every recipe detail link reachable from the start URLs.
    ///
    /// Follows each start URL's "next page" chain until there is no next link
    /// or the next URL was already visited in this run. A fetch failure stops
    /// only the chain it happened in.
    pub async fn gather_links(&self) -> HashSet<String> {
        let site = &self.config.site_name;
        let mut visited: HashSet<String> = HashSet::new();
        let mut links: HashSet<String> = HashSet::new();

        for start_url in &self.config.start_urls {
            // Normalized so a "next" link back to the start URL hits the visited set.
            let mut current = self
                .config
                .resolve(start_url)
                .or_else(|| Some(start_url.clone()));

            while let Some(page_url) = current.take() {
                if !visited.insert(page_url.clone()) {
                    debug!(site = %site, url = %page_url, "Listing page already visited, chain ends");
                    break;
                }

                let html = match self.fetcher.fetch(&page_url).await {
                    Ok(html) => html,
                    Err(e) => {
                        warn!(site = %site, url = %page_url, error = %e, "Failed to fetch listing page, chain stops");
                        break;
                    }
                };

                let found = self.extractor.detail_links(&html, self.config);
                debug!(site = %site, url = %page_url, links = found.len(), "Listing page parsed");
                links.extend(found);

                current = self.extractor.next_page(&html, self.config);
            }
        }

        info!(
            site = %site,
            links = links.len(),
            listing_pages = visited.len(),
            "Recipe link discovery complete"
        );
        links
    }

    /// Fetch and extract a single recipe page.
    pub async fn scrape(&self, url: &str) -> CrawlResult<(String, RecipeRecord)> {
        let html = self.fetcher.fetch(url).await?;
        let record = self.extractor.extract(&html);
        Ok((html, record))
    }

    /// Discover links, then scrape each one into the sink.
    pub async fn crawl<S: RecipeSink>(&self, sink: &S) -> CrawlSummary {
        let site = &self.config.site_name;
        info!(site = %site, fetcher = %self.fetcher.name(), "Starting site crawl");

        let links = self.gather_links().await;
        let mut summary = CrawlSummary {
            links_found: links.len(),
            ..Default::default()
        };

        for link in &links {
            let result = match self.scrape(link).await {
                Ok((html, record)) => {
                    let saved = sink.save(link, &html, &record).await;
                    saved
                        .map(|_| record)
                        .map_err(|e| CrawlError::Sink(Box::new(e)))
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(record) => {
                    summary.saved += 1;
                    debug!(site = %site, url = %link, title = %record.title, "Recipe saved");
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(site = %site, url = %link, error = %e, "Skipping recipe link");
                }
            }
        }

        if let Err(e) = self.fetcher.shutdown().await {
            warn!(site = %site, error = %e, "Fetcher shutdown failed");
        }

        info!(
            site = %site,
            links = summary.links_found,
            saved = summary.saved,
            failed = summary.failed,
            "Site crawl finished"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockFetcher, RecordingSink};

    fn listing_config() -> SiteConfig {
        SiteConfig::new("Mock", "https://mock.test/recipes", "a.recipe")
            .with_pagination("a.next")
            .with_title("h1")
            .with_ingredients("li.ing")
    }

    fn listing(links: &[&str], next: Option<&str>) -> String {
        let mut html = String::from("<html><body>");
        for link in links {
            html.push_str(&format!(r#"<a class="recipe" href="{}">r</a>"#, link));
        }
        if let Some(next) = next {
            html.push_str(&format!(r#"<a class="next" href="{}">next</a>"#, next));
        }
        html.push_str("</body></html>");
        html
    }

    #[tokio::test]
    async fn test_pagination_cycle_terminates() {
        let config = listing_config();
        let fetcher = MockFetcher::new()
            .with_page("https://mock.test/recipes", listing(&["/r/1", "/r/2"], Some("/recipes?page=2")))
            .with_page("https://mock.test/recipes?page=2", listing(&["/r/2", "/r/3"], Some("/recipes")));

        let crawler = SiteCrawler::new(&config, &fetcher);
        let links = crawler.gather_links().await;

        let expected: HashSet<String> = ["/r/1", "/r/2", "/r/3"]
            .iter()
            .map(|p| format!("https://mock.test{}", p))
            .collect();
        assert_eq!(links, expected);
        assert_eq!(fetcher.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_chain_does_not_stop_other_start_urls() {
        let config = listing_config().with_start_url("https://mock.test/desserts");
        let fetcher = MockFetcher::new()
            .with_failure("https://mock.test/recipes")
            .with_page("https://mock.test/desserts", listing(&["/r/9"], None));

        let crawler = SiteCrawler::new(&config, &fetcher);
        let links = crawler.gather_links().await;

        assert_eq!(links.len(), 1);
        assert!(links.contains("https://mock.test/r/9"));
    }

    #[tokio::test]
    async fn test_crawl_saves_and_skips_failures() {
        let config = listing_config();
        let fetcher = MockFetcher::new()
            .with_page("https://mock.test/recipes", listing(&["/r/1", "/r/2"], None))
            .with_page(
                "https://mock.test/r/1",
                r#"<h1>Pancakes</h1><li class="ing">1 cup flour</li><li class="ing">1 egg</li>"#,
            )
            .with_failure("https://mock.test/r/2");
        let sink = RecordingSink::new();

        let crawler = SiteCrawler::new(&config, &fetcher);
        let summary = crawler.crawl(&sink).await;

        assert_eq!(
            summary,
            CrawlSummary {
                links_found: 2,
                saved: 1,
                failed: 1
            }
        );
        let saved = sink.records();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, "https://mock.test/r/1");
        assert_eq!(saved[0].1.title, "Pancakes");
        assert_eq!(saved[0].1.ingredients, vec!["1 cup flour", "1 egg"]);
        assert_eq!(fetcher.shutdowns(), 1);
    }

    #[tokio::test]
    async fn test_sink_failure_is_counted_not_fatal() {
        let config = listing_config();
        let fetcher = MockFetcher::new()
            .with_page("https://mock.test/recipes", listing(&["/r/1", "/r/2"], None))
            .with_page("https://mock.test/r/1", "<h1>Bad</h1>")
            .with_page("https://mock.test/r/2", "<h1>Good</h1>");
        let sink = RecordingSink::new().rejecting_title("Bad");

        let summary = SiteCrawler::new(&config, &fetcher).crawl(&sink).await;

        assert_eq!(summary.saved, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(sink.records()[0].1.title, "Good");
    }
}
