//! Media retrieval
//!
//! Downloads attachment bytes with a per-item size ceiling. Timeouts are
//! enforced by the caller so every fetcher gets the same treatment.

use crate::feed::build_http_client;
use crate::storage::StorageError;
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while retrieving one media item
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("download timed out after {0:?}")]
    Timeout(Duration),

    #[error("media exceeds size limit of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("media has no downloadable URL")]
    MissingUrl,

    #[error("failed to store media: {0}")]
    Storage(#[from] StorageError),

    #[error("download task ended unexpectedly: {0}")]
    Task(String),
}

impl MediaError {
    /// Returns true if another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout(_) => true,
            Self::Status(code) => {
                *code >= 500
                    || *code == StatusCode::REQUEST_TIMEOUT.as_u16()
                    || *code == StatusCode::TOO_MANY_REQUESTS.as_u16()
            }
            Self::TooLarge { .. } | Self::MissingUrl | Self::Storage(_) | Self::Task(_) => false,
        }
    }
}

/// Per-item retrieval limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaLimits {
    /// Largest accepted body
    pub max_bytes: u64,

    /// Longest a single attempt may take
    pub timeout: Duration,
}

impl Default for MediaLimits {
    fn default() -> Self {
        Self {
            max_bytes: 50 * 1024 * 1024,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Retrieves media bytes by URL
pub trait MediaFetcher: Send + Sync + 'static {
    /// Downloads `url`, failing with `TooLarge` once more than `max_bytes` arrive
    fn fetch(
        &self,
        url: &str,
        max_bytes: u64,
    ) -> impl Future<Output = Result<Vec<u8>, MediaError>> + Send;
}

/// Media fetcher over HTTP
#[derive(Debug, Clone)]
pub struct HttpMediaFetcher {
    client: Client,
    /// Timeout configured on `client`, reported when a request times out
    timeout: Duration,
}

impl HttpMediaFetcher {
    /// Wraps a client built with the given request timeout
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Builds a fetcher with its own client whose timeout matches `limits`
    pub fn with_limits(limits: &MediaLimits) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(limits.timeout)?, limits.timeout))
    }

    fn classify(&self, e: reqwest::Error) -> MediaError {
        if e.is_timeout() {
            MediaError::Timeout(self.timeout)
        } else {
            MediaError::Http(e.to_string())
        }
    }
}

impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &str, max_bytes: u64) -> Result<Vec<u8>, MediaError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::Status(status.as_u16()));
        }

        if let Some(length) = response.content_length() {
            if length > max_bytes {
                return Err(MediaError::TooLarge { limit: max_bytes });
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.classify(e))? {
            if (body.len() + chunk.len()) as u64 > max_bytes {
                return Err(MediaError::TooLarge { limit: max_bytes });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }
}
