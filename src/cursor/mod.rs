//! Sync cursor persistence
//!
//! The cursor is a single value: the identifier of the newest bookmark known
//! to be archived. It is read once when a run starts and written at most once
//! when a run completes.

mod file;
mod tracker;

pub use file::FileCursorStore;
pub use tracker::CursorTracker;

use crate::storage::StorageResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Identifier boundary of previously archived content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    /// Identifier of the newest fully materialized bookmark
    #[serde(rename = "last_sync")]
    pub id: String,

    /// When the cursor was last advanced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SyncCursor {
    /// Creates a cursor stamped with the current time
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            updated_at: Some(Utc::now()),
        }
    }
}

/// Durable single-value store for the sync cursor
///
/// `load` never fails: unreadable or corrupt state degrades to "absent",
/// which only costs a full re-walk of the feed. `save` must be atomic with
/// respect to a crash.
pub trait CursorStore {
    /// Reads the stored cursor, or `None` on first run or corrupt state
    fn load(&self) -> Option<SyncCursor>;

    /// Replaces the stored cursor
    fn save(&self, cursor: &SyncCursor) -> StorageResult<()>;
}

/// In-memory cursor store, for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    cursor: Mutex<Option<SyncCursor>>,
}

impl MemoryCursorStore {
    pub fn new(initial: Option<SyncCursor>) -> Self {
        Self {
            cursor: Mutex::new(initial),
        }
    }

    /// Returns the identifier currently stored, if any
    pub fn current_id(&self) -> Option<String> {
        self.load().map(|c| c.id)
    }
}

impl CursorStore for MemoryCursorStore {
    fn load(&self) -> Option<SyncCursor> {
        self.cursor.lock().ok().and_then(|guard| guard.clone())
    }

    fn save(&self, cursor: &SyncCursor) -> StorageResult<()> {
        if let Ok(mut guard) = self.cursor.lock() {
            *guard = Some(cursor.clone());
        }
        Ok(())
    }
}
