//! Pagination driver
//!
//! Walks the feed page by page, newest first, and stops at the first of:
//! - the feed reporting no further page
//! - a page containing the resume cursor (the boundary of archived content)
//!
//! Each page fetch is retried under the page policy. Running out of retries
//! fails the whole run: skipping a page would leave a gap the cursor can
//! never detect.

use crate::feed::{FeedError, FeedSource};
use crate::record::BookmarkRecord;
use crate::sync::retry::{RetryDecision, RetryPolicy};
use crate::SyncError;
use std::collections::HashSet;

/// Maps a feed failure to a retry decision
pub fn classify_feed_error(error: &FeedError) -> RetryDecision {
    match error {
        FeedError::RateLimited {
            retry_after: Some(delay),
        } => RetryDecision::RetryAfter(*delay),
        FeedError::RateLimited { retry_after: None } | FeedError::Transient(_) => {
            RetryDecision::Retry
        }
        FeedError::Auth { .. } | FeedError::Rejected { .. } | FeedError::Malformed(_) => {
            RetryDecision::Abort
        }
    }
}

/// Lazy, forward-only sequence of bookmark pages
pub struct Paginator<'a, F> {
    feed: &'a F,
    resume_id: Option<String>,
    page_size: u32,
    policy: RetryPolicy,
    next_token: Option<String>,
    seen_tokens: HashSet<String>,
    pages_fetched: usize,
    finished: bool,
    boundary_reached: bool,
}

impl<'a, F: FeedSource> Paginator<'a, F> {
    /// Creates a paginator
    ///
    /// # Arguments
    ///
    /// * `feed` - The feed to walk
    /// * `resume_id` - Identifier at which to stop (exclusive), `None` to walk everything
    /// * `page_size` - Records requested per page
    /// * `policy` - Retry policy applied to every page
    pub fn new(
        feed: &'a F,
        resume_id: Option<String>,
        page_size: u32,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            feed,
            resume_id,
            page_size,
            policy,
            next_token: None,
            seen_tokens: HashSet::new(),
            pages_fetched: 0,
            finished: false,
            boundary_reached: false,
        }
    }

    /// Number of pages fetched so far
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// True once a page contained the resume cursor
    pub fn boundary_reached(&self) -> bool {
        self.boundary_reached
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fetches the next page
    ///
    /// # Returns
    ///
    /// * `Ok(Some(records))` - Records of the next page, newest first, cut
    ///   before the resume cursor if the page contains it
    /// * `Ok(None)` - The sequence is exhausted
    /// * `Err(SyncError)` - Credential failure, malformed response, or page
    ///   retries exhausted
    pub async fn next_page(&mut self) -> Result<Option<Vec<BookmarkRecord>>, SyncError> {
        if self.finished {
            return Ok(None);
        }

        let page_number = self.pages_fetched + 1;
        let feed = self.feed;
        let token = self.next_token.clone();
        let page_size = self.page_size;
        let label = format!("Fetching page {}", page_number);

        let page = self
            .policy
            .run(
                &label,
                |attempt| {
                    tracing::debug!(
                        "Requesting page {} (attempt {}, token {:?})",
                        page_number,
                        attempt,
                        token
                    );
                    feed.fetch_page(token.as_deref(), page_size)
                },
                classify_feed_error,
            )
            .await
            .map_err(|e| {
                self.finished = true;
                if e.exhausted {
                    SyncError::PageExhausted {
                        page: page_number,
                        attempts: e.attempts,
                        last: e.error,
                    }
                } else {
                    e.error.into_sync_error()
                }
            })?;

        self.pages_fetched = page_number;
        let mut records = page.records;

        if let Some(resume_id) = &self.resume_id {
            if let Some(position) = records.iter().position(|r| &r.id == resume_id) {
                tracing::info!(
                    "Reached previously synced bookmark {} on page {}",
                    resume_id,
                    page_number
                );
                records.truncate(position);
                self.finished = true;
                self.boundary_reached = true;
                return Ok(Some(records));
            }
        }

        match page.next_token {
            None => {
                tracing::debug!("Feed exhausted after page {}", page_number);
                self.finished = true;
            }
            Some(next) => {
                if !self.seen_tokens.insert(next.clone()) {
                    self.finished = true;
                    return Err(SyncError::Pagination(format!(
                        "feed returned pagination token {} twice",
                        next
                    )));
                }
                self.next_token = Some(next);
            }
        }

        Ok(Some(records))
    }
}
