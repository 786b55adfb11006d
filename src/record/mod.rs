//! Record module: the values the feed delivers and the archive stores
//!
//! # Components
//!
//! - `BookmarkRecord`: one saved post, immutable once fetched
//! - `MediaRef`: one attachment of a post and its materialization state
//! - `MediaKind`: declared media type (image, video, animated image)
//! - `MediaState`: unresolved → resolved | failed, never reverting

mod bookmark;
mod media;

pub use bookmark::BookmarkRecord;
pub use media::{MediaKind, MediaRef, MediaState};

/// Replaces characters that are unsafe in file names with underscores
pub(crate) fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Sanitizes an identifier for use as the last dash-separated part of a file name
pub(crate) fn sanitize_identifier(raw: &str) -> String {
    sanitize_component(raw).replace('-', "_")
}
