//! Raw feed retrieval.

use std::time::Duration;

use async_trait::async_trait;

use crate::{SourceError, retry};

/// Environment variable overriding the per-request timeout, in seconds.
pub const HTTP_TIMEOUT_ENV: &str = "COVID_TRACK_HTTP_TIMEOUT_SECS";

/// Per-request timeout when [`HTTP_TIMEOUT_ENV`] is unset.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// Retrieves the raw bytes of a feed.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Downloads the document at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the document cannot be retrieved.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError>;
}

/// [`FeedFetcher`] backed by a `reqwest` client with retry.
pub struct HttpFeedFetcher {
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    /// Builds a fetcher whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("covid-track/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    /// Builds a fetcher using [`HTTP_TIMEOUT_ENV`] or
    /// [`DEFAULT_HTTP_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the client cannot be constructed.
    pub fn from_env() -> Result<Self, SourceError> {
        let timeout = std::env::var(HTTP_TIMEOUT_ENV)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(DEFAULT_HTTP_TIMEOUT, Duration::from_secs);
        Self::new(timeout)
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        log::info!("Downloading {url}");
        let body = retry::send_bytes(|| self.client.get(url)).await?;
        log::info!("Downloaded {} bytes from {url}", body.len());
        Ok(body)
    }
}
