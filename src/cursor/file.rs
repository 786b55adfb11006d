//! File-backed cursor store
//!
//! Stores the cursor as a small JSON document. Saves go through
//! `atomic_write`, so an interrupted save leaves the previous value readable.

use crate::cursor::{CursorStore, SyncCursor};
use crate::storage::{atomic_write, StorageError, StorageResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Cursor store kept in a JSON file
#[derive(Debug, Clone)]
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    /// Creates a store backed by `path`; nothing is read or created yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CursorStore for FileCursorStore {
    fn load(&self) -> Option<SyncCursor> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No cursor state at {}", self.path.display());
                return None;
            }
            Err(e) => {
                tracing::warn!(
                    "Cursor state at {} is unreadable, starting full sync: {}",
                    self.path.display(),
                    e
                );
                return None;
            }
        };

        match serde_json::from_str::<SyncCursor>(&content) {
            Ok(cursor) if !cursor.id.trim().is_empty() => Some(cursor),
            Ok(_) => {
                tracing::warn!(
                    "Cursor state at {} holds an empty id, starting full sync",
                    self.path.display()
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    "Cursor state at {} is corrupt, starting full sync: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    fn save(&self, cursor: &SyncCursor) -> StorageResult<()> {
        let json = serde_json::to_vec_pretty(cursor).map_err(StorageError::Serialization)?;
        atomic_write(&self.path, &json)?;
        tracing::debug!("Saved cursor {} to {}", cursor.id, self.path.display());
        Ok(())
    }
}
