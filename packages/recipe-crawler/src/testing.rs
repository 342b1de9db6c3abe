//! Testing utilities including mock implementations.
//!
//! Useful for testing crawl and storage logic without making real network
//! calls or opening a browser.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::crawler::RecipeSink;
use crate::error::{CrawlError, CrawlResult};
use crate::fetchers::PageFetcher;
use crate::types::RecipeRecord;

/// A fetcher that serves canned HTML by URL.
///
/// Unknown URLs and URLs registered with [`MockFetcher::with_failure`] fail
/// with a `CrawlError::Fetch`, as an exhausted retry budget would.
#[derive(Default)]
pub struct MockFetcher {
    pages: HashMap<String, String>,
    failures: HashSet<String>,
    calls: Arc<RwLock<Vec<String>>>,
    shutdowns: Arc<RwLock<usize>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` for `url`.
    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    /// Fail every fetch of `url`.
    pub fn with_failure(mut self, url: impl Into<String>) -> Self {
        self.failures.insert(url.into());
        self
    }

    /// URLs fetched so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    pub fn shutdowns(&self) -> usize {
        *self.shutdowns.read().unwrap()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> CrawlResult<String> {
        self.calls.write().unwrap().push(url.to_string());

        if self.failures.contains(url) {
            return Err(CrawlError::fetch(url, 3, "mock failure"));
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| CrawlError::fetch(url, 3, "HTTP 404 Not Found"))
    }

    async fn shutdown(&self) -> CrawlResult<()> {
        *self.shutdowns.write().unwrap() += 1;
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Error returned by [`RecordingSink`] for rejected titles.
#[derive(Debug, thiserror::Error)]
#[error("rejected recipe: {0}")]
pub struct RejectedRecipe(pub String);

/// A sink that keeps everything it is given.
#[derive(Default)]
pub struct RecordingSink {
    records: Arc<RwLock<Vec<(String, RecipeRecord)>>>,
    reject: HashSet<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail saves of recipes with this title.
    pub fn rejecting_title(mut self, title: impl Into<String>) -> Self {
        self.reject.insert(title.into());
        self
    }

    /// Saved `(url, record)` pairs in save order.
    pub fn records(&self) -> Vec<(String, RecipeRecord)> {
        self.records.read().unwrap().clone()
    }
}

#[async_trait]
impl RecipeSink for RecordingSink {
    type Error = RejectedRecipe;

    async fn save(&self, url: &str, _html: &str, record: &RecipeRecord) -> Result<(), Self::Error> {
        if self.reject.contains(&record.title) {
            return Err(RejectedRecipe(record.title.clone()));
        }
        self.records
            .write()
            .unwrap()
            .push((url.to_string(), record.clone()));
        Ok(())
    }
}
