//! Page fetching.
//!
//! Every scraper goes through [`PageFetcher`] so parsing can be exercised
//! against canned HTML. [`HttpFetcher`] is the real implementation: a shared
//! `reqwest` client with a bounded per-request timeout and a randomly chosen
//! desktop User-Agent on every request.

use crate::error::PipelineError;
use rand::{Rng, rng};
use reqwest::Client;
use reqwest::header::USER_AGENT;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:131.0) Gecko/20100101 Firefox/131.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:131.0) Gecko/20100101 Firefox/131.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36",
];

/// A fetched page. Non-2xx responses are returned too, so callers can decide
/// how a given status degrades.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body, or [`PipelineError::HttpStatus`] for a non-2xx page.
    pub fn into_success(self) -> Result<String, PipelineError> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(PipelineError::HttpStatus(self.status))
        }
    }
}

/// Trait for retrieving a web page.
///
/// Scrapers depend on this rather than on an HTTP client so they can be
/// driven by canned pages in tests.
pub trait PageFetcher: Send + Sync {
    /// GET `url`.
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute http(s) URL of the page
    ///
    /// # Returns
    ///
    /// The status and body for any response, including non-2xx ones.
    /// Transport failures and timeouts become [`PipelineError::NetworkFailure`].
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchedPage, PipelineError>> + Send;
}

/// [`PageFetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher whose every request is bounded by `timeout`.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Whole-request timeout; connecting is capped at 5 seconds
    ///
    /// # Example
    ///
    /// ```ignore
    /// let fetcher = HttpFetcher::new(Duration::from_secs(12))?;
    /// let page = fetcher.fetch("https://www.zoomit.ir/").await?;
    /// ```
    pub fn new(timeout: Duration) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()?;
        Ok(Self { client })
    }

    fn random_user_agent() -> &'static str {
        USER_AGENTS[rng().random_range(0..USER_AGENTS.len())]
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<FetchedPage, PipelineError> {
        let t0 = Instant::now();
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, Self::random_user_agent())
            .send()
            .await
            .inspect_err(|e| warn!(%url, error = %e, "Request failed"))?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(
            %url,
            status,
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(FetchedPage { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_success() {
        let ok = FetchedPage {
            status: 200,
            body: "<html></html>".into(),
        };
        assert_eq!(ok.into_success().unwrap(), "<html></html>");

        let gone = FetchedPage {
            status: 404,
            body: String::new(),
        };
        assert!(matches!(gone.into_success(), Err(PipelineError::HttpStatus(404))));
    }

    #[test]
    fn test_random_user_agent_is_from_pool() {
        for _ in 0..20 {
            assert!(USER_AGENTS.contains(&HttpFetcher::random_user_agent()));
        }
    }
}
