//! Synchronization engine
//!
//! This module handles:
//! - Retry policy shared by page fetches and media downloads
//! - Walking the feed page by page down to the resume cursor
//! - Materializing records into documents and media files
//! - Orchestrating a run and committing the cursor

pub mod materializer;
pub mod media;
pub mod orchestrator;
pub mod pagination;
pub mod retry;

pub use materializer::{MaterializedRecord, Materializer};
pub use media::{HttpMediaFetcher, MediaError, MediaFetcher, MediaLimits};
pub use orchestrator::{Orchestrator, SyncPhase};
pub use pagination::Paginator;
pub use retry::{Backoff, RetryDecision, RetryPolicy};

use crate::config::Config;
use crate::cursor::CursorStore;
use crate::feed::FeedSource;
use crate::output::RunSummary;
use crate::record::MediaKind;
use crate::storage::ArtifactStore;
use crate::{ConfigError, SyncError};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Options controlling a single sync run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Ignore the stored cursor and walk the whole feed
    pub force_full_resync: bool,

    /// Rewrite documents that already exist
    pub overwrite: bool,

    /// Download media files (otherwise link to the remote copy)
    pub download_media: bool,

    /// Kinds to download; empty means every kind
    pub media_types: HashSet<MediaKind>,

    /// Records requested per page
    pub page_size: u32,

    /// Keep going when a record cannot be materialized
    pub skip_errors: bool,

    pub page_retry: RetryPolicy,
    pub media_retry: RetryPolicy,
    pub media_limits: MediaLimits,

    /// Concurrent media downloads
    pub workers: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            force_full_resync: false,
            overwrite: false,
            download_media: true,
            media_types: HashSet::new(),
            page_size: 100,
            skip_errors: true,
            page_retry: RetryPolicy::default(),
            media_retry: RetryPolicy::default(),
            media_limits: MediaLimits::default(),
            workers: materializer::DEFAULT_WORKERS,
        }
    }
}

impl SyncOptions {
    /// Builds run options from a validated configuration
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            download_media: config.media.download,
            media_types: config.media_kinds()?,
            page_size: config.feed.page_size,
            page_retry: RetryPolicy::for_pages(&config.retry),
            media_retry: RetryPolicy::for_media(&config.retry),
            media_limits: MediaLimits {
                max_bytes: config.media.max_bytes,
                timeout: Duration::from_secs(config.media.timeout_secs),
            },
            workers: config.media.workers,
            ..Self::default()
        })
    }
}

/// A run that ended in the failed state, with what it got done before failing
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunFailure {
    pub summary: RunSummary,
    #[source]
    pub error: SyncError,
}

/// Runs one synchronization
///
/// # Arguments
///
/// * `feed` - Source of bookmark pages
/// * `store` - Cursor store, read once and written at most once
/// * `artifacts` - Local artifact store
/// * `fetcher` - Media fetcher shared by all download tasks
/// * `options` - Run options
///
/// # Returns
///
/// * `Ok(RunSummary)` - The walk completed; the cursor may have advanced
/// * `Err(RunFailure)` - The run failed; the cursor is unchanged
pub async fn run_sync<F, S, M>(
    feed: &F,
    store: &S,
    artifacts: ArtifactStore,
    fetcher: Arc<M>,
    options: &SyncOptions,
) -> Result<RunSummary, RunFailure>
where
    F: FeedSource,
    S: CursorStore,
    M: MediaFetcher,
{
    let materializer = Materializer::new(fetcher, artifacts)
        .with_policy(options.media_retry.clone())
        .with_limits(options.media_limits)
        .with_download(options.download_media)
        .with_media_types(options.media_types.clone())
        .with_workers(options.workers);

    Orchestrator::new(feed, store, materializer, options)
        .run()
        .await
}
