//! Local artifact layout
//!
//! One markdown document per bookmark in the output directory and one file
//! per resolved media item in the media directory, both addressed by the
//! identifier of what they hold.

use crate::record::{BookmarkRecord, MediaRef};
use crate::storage::{atomic_write, is_temp_file, StorageError, StorageResult};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Artifact store rooted at an output directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    output_dir: PathBuf,
    media_dir: PathBuf,
    /// Bookmark ids found on disk when the store was opened
    indexed_ids: Arc<HashSet<String>>,
}

impl ArtifactStore {
    /// Opens (creating if needed) an artifact store
    ///
    /// # Arguments
    ///
    /// * `output_dir` - Directory that holds the markdown documents
    /// * `media_dir` - Directory that holds downloaded media
    ///
    /// # Returns
    ///
    /// * `Ok(ArtifactStore)` - Store with an index of existing documents
    /// * `Err(StorageError)` - Output directory could not be created or read
    pub fn open(output_dir: impl Into<PathBuf>, media_dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let output_dir = output_dir.into();
        let media_dir = media_dir.into();

        fs::create_dir_all(&output_dir).map_err(|e| StorageError::io(&output_dir, e))?;
        let indexed_ids = index_documents(&output_dir)?;

        tracing::debug!(
            "Indexed {} existing bookmark artifacts in {}",
            indexed_ids.len(),
            output_dir.display()
        );

        Ok(Self {
            output_dir,
            media_dir,
            indexed_ids: Arc::new(indexed_ids),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    /// Number of documents that existed when the store was opened
    pub fn indexed_count(&self) -> usize {
        self.indexed_ids.len()
    }

    /// Path of the markdown document for a record
    pub fn bookmark_path(&self, record: &BookmarkRecord) -> PathBuf {
        self.output_dir.join(format!("{}.md", record.artifact_stem()))
    }

    /// Returns true if a document for this record's identifier already exists
    ///
    /// Matches by identifier so a renamed author does not cause a duplicate.
    pub fn has_bookmark(&self, record: &BookmarkRecord) -> bool {
        self.indexed_ids.contains(&record.artifact_id())
            || self.bookmark_path(record).is_file()
    }

    /// Writes a record's markdown document atomically
    pub fn write_bookmark(&self, record: &BookmarkRecord, markdown: &str) -> StorageResult<PathBuf> {
        let path = self.bookmark_path(record);
        atomic_write(&path, markdown.as_bytes())?;
        Ok(path)
    }

    /// Path of the local file for a media reference
    pub fn media_path(&self, media: &MediaRef) -> PathBuf {
        self.media_dir.join(media.file_name())
    }

    /// Returns true if the media item has already been stored
    pub fn has_media(&self, media: &MediaRef) -> bool {
        self.media_path(media).is_file()
    }

    /// Creates the media directory
    pub fn ensure_media_dir(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.media_dir).map_err(|e| StorageError::io(&self.media_dir, e))
    }

    /// Stores downloaded media bytes atomically
    pub fn write_media(&self, media: &MediaRef, bytes: &[u8]) -> StorageResult<PathBuf> {
        let path = self.media_path(media);
        atomic_write(&path, bytes)?;
        Ok(path)
    }

    /// Link text for `path` as seen from a document in the output directory
    ///
    /// Relative when the file lives under the output directory, absolute otherwise.
    pub fn link_to(&self, path: &Path) -> String {
        match path.strip_prefix(&self.output_dir) {
            Ok(relative) => relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => path.display().to_string(),
        }
    }
}

/// Collects the identifiers of all markdown documents in `dir`
fn index_documents(dir: &Path) -> StorageResult<HashSet<String>> {
    let mut ids = HashSet::new();
    let entries = fs::read_dir(dir).map_err(|e| StorageError::io(dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| StorageError::io(dir, e))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if is_temp_file(&name) {
            continue;
        }

        if let Some(stem) = name.strip_suffix(".md") {
            if let Some((_, id)) = stem.rsplit_once('-') {
                ids.insert(id.to_string());
            }
        }
    }

    Ok(ids)
}
