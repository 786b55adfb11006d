//! Bookmark Mirror: incremental local archive of bookmarked posts
//!
//! This crate turns a remote, paginated, rate-limited bookmark feed into a
//! durable, resumable, idempotent directory of markdown files with their media.

pub mod config;
pub mod cursor;
pub mod feed;
pub mod output;
pub mod record;
pub mod storage;
pub mod sync;

use std::time::Duration;
use thiserror::Error;

/// Main error type for synchronization runs
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Page {page} could not be fetched after {attempts} attempts: {last}")]
    PageExhausted {
        page: usize,
        attempts: u32,
        #[source]
        last: feed::FeedError,
    },

    #[error("Pagination error: {0}")]
    Pagination(String),

    #[error("Feed error: {0}")]
    Feed(#[from] feed::FeedError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Cursor store is not writable: {0}")]
    CursorStore(#[source] storage::StorageError),

    #[error("Failed to materialize bookmark {id}: {source}")]
    Record {
        id: String,
        #[source]
        source: Box<SyncError>,
    },

    #[error("Invalid media transition: {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SyncError {
    /// Returns true for conditions that need the user to re-authenticate
    pub fn is_auth(&self) -> bool {
        match self {
            Self::Auth(_) => true,
            Self::Record { source, .. } => source.is_auth(),
            _ => false,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Missing credential: environment variable {0} is not set")]
    MissingToken(String),
}

/// Result type alias for synchronization operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Upper bound on how long a single rate-limit pause may last
pub const DEFAULT_MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(900);

// Re-export commonly used types
pub use config::Config;
pub use cursor::{CursorStore, FileCursorStore, SyncCursor};
pub use feed::{FeedError, FeedPage, FeedSource, XFeedClient};
pub use output::{RunStatus, RunSummary};
pub use record::{BookmarkRecord, MediaKind, MediaRef, MediaState};
pub use storage::ArtifactStore;
pub use sync::{run_sync, RunFailure, SyncOptions};
