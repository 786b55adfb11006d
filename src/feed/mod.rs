//! Feed source module
//!
//! This module defines the contract the sync engine consumes from the remote
//! bookmark feed, and provides the X API v2 implementation:
//! - `FeedSource`: one page of records per call, given an optional page token
//! - `FeedError`: authentication, rate limiting, transient and malformed failures
//! - `XFeedClient`: HTTP client for the bookmarks endpoint

mod x_api;

pub use x_api::{build_http_client, parse_retry_after, XFeedClient};

use crate::record::BookmarkRecord;
use crate::SyncError;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a feed source
#[derive(Debug, Error)]
pub enum FeedError {
    /// Credential rejected; never retried
    #[error("credential rejected (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    /// Source asked us to slow down, optionally saying for how long
    #[error("rate limited by feed source{}", retry_suffix(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    /// Network failure or server-side error worth retrying
    #[error("transient network error: {0}")]
    Transient(String),

    /// Request refused for a reason other than credentials; not retried
    #[error("request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// Response could not be understood; retrying will not help
    #[error("malformed feed response: {0}")]
    Malformed(String),
}

fn retry_suffix(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {}s)", d.as_secs()),
        None => String::new(),
    }
}

impl FeedError {
    /// Returns true if the same request may succeed when repeated
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient(_))
    }

    /// Lifts the error to the run level, keeping credential failures distinct
    pub fn into_sync_error(self) -> SyncError {
        match self {
            Self::Auth { .. } => SyncError::Auth(self.to_string()),
            other => SyncError::Feed(other),
        }
    }
}

/// One page of the bookmark feed, newest record first
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    pub records: Vec<BookmarkRecord>,

    /// Token for the next (older) page; `None` when the feed is exhausted
    pub next_token: Option<String>,
}

impl FeedPage {
    pub fn new(records: Vec<BookmarkRecord>, next_token: Option<String>) -> Self {
        Self {
            records,
            next_token,
        }
    }
}

/// Supplier of bookmark pages
///
/// Implementations return records newest first within a page, and pages in
/// newest-to-oldest order when following `next_token`.
pub trait FeedSource {
    /// Fetches one page
    ///
    /// # Arguments
    ///
    /// * `page_token` - Token from the previous page, `None` for the first page
    /// * `page_size` - Maximum number of records to return
    fn fetch_page(
        &self,
        page_token: Option<&str>,
        page_size: u32,
    ) -> impl Future<Output = Result<FeedPage, FeedError>> + Send;
}
