//! # Feed Retrieval
//!
//! Fetches the raw DSN activity feed.
//!
//! The scheduler only sees the [`FeedFetcher`] trait, so tests can swap in
//! a mock and the HTTP client stays an implementation detail.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::FeedConfig;
use crate::error::{DsnLoggerError, Result};

/// Source of raw feed snapshots
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Retrieve the complete current feed text
    async fn fetch(&self) -> Result<String>;
}

/// Blocking HTTP client for the DSN feed, run on tokio's blocking pool
#[derive(Clone)]
pub struct HttpFeedFetcher {
    agent: ureq::Agent,
    url: String,
    timeout: Duration,
}

impl std::fmt::Debug for HttpFeedFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFeedFetcher")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpFeedFetcher {
    /// Create a fetcher for `url` with an overall request timeout
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("dsn-logger/", env!("CARGO_PKG_VERSION")))
            .build();

        Self {
            agent,
            url: url.into(),
            timeout,
        }
    }

    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(config.url.clone(), config.timeout())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn fetch_blocking(agent: &ureq::Agent, url: &str) -> Result<String> {
        let response = agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => {
                DsnLoggerError::Fetch(format!("{} returned HTTP {}", url, code))
            }
            other => DsnLoggerError::Fetch(format!("Failed to reach {}: {}", url, other)),
        })?;

        let body = response
            .into_string()
            .map_err(|e| DsnLoggerError::Fetch(format!("Failed to read body from {}: {}", url, e)))?;

        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self) -> Result<String> {
        let agent = self.agent.clone();
        let url = self.url.clone();

        tokio::task::spawn_blocking(move || Self::fetch_blocking(&agent, &url))
            .await
            .map_err(|e| DsnLoggerError::Fetch(format!("Fetch task failed: {}", e)))?
    }
}
