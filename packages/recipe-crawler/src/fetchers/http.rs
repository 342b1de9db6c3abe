//! HTTP fetcher with bounded retry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

use super::PageFetcher;
use crate::error::{CrawlError, CrawlResult};

/// Browser-like User-Agent; several recipe sites reject obvious bots.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36";

/// Retry policy for transient HTTP failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before retry `n` is `backoff_factor * 2^(n-1)`.
    pub backoff_factor: Duration,
    /// Statuses worth retrying. Transport errors are always retried.
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_factor: Duration::from_secs(2),
            retry_statuses: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_backoff_factor(mut self, factor: Duration) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn should_retry(&self, status: StatusCode) -> bool {
        self.retry_statuses.contains(&status.as_u16())
    }

    /// Delay to sleep after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_factor * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Plain HTTP GET fetcher.
pub struct HttpFetcher {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl HttpFetcher {
    /// Create a fetcher with the given per-request timeout.
    pub fn new(timeout: Duration) -> CrawlResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| CrawlError::Client(e.to_string()))?;

        Ok(Self {
            client,
            policy: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> CrawlResult<String> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(url = %url, attempt, "HTTP fetch starting");

            let reason = match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => {
                    return response
                        .text()
                        .await
                        .map_err(|e| CrawlError::fetch(url, attempt, e.to_string()));
                }
                Ok(response) => {
                    let status = response.status();
                    if !self.policy.should_retry(status) {
                        warn!(url = %url, status = %status, "HTTP request failed, not retrying");
                        return Err(CrawlError::fetch(url, attempt, format!("HTTP {}", status)));
                    }
                    format!("HTTP {}", status)
                }
                Err(e) => e.to_string(),
            };

            if attempt >= self.policy.max_attempts {
                warn!(url = %url, attempts = attempt, error = %reason, "Retry budget exhausted");
                return Err(CrawlError::fetch(url, attempt, reason));
            }

            let delay = self.policy.delay_after(attempt);
            warn!(
                url = %url,
                attempt,
                error = %reason,
                delay_ms = delay.as_millis() as u64,
                "Transient fetch failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}
