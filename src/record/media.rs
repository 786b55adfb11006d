//! Media reference definitions for tracking attachment materialization
use crate::record::sanitize_component;
use crate::SyncError;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Declared type of an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Still image
    Image,

    /// Video clip
    Video,

    /// Looping animation (delivered as video by the feed)
    AnimatedImage,
}

impl MediaKind {
    /// Name used by the feed and in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "photo",
            Self::Video => "video",
            Self::AnimatedImage => "animated_gif",
        }
    }

    /// Parses a feed/config name, accepting a few common aliases
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "photo" | "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "animated_gif" | "gif" | "animated-image" => Some(Self::AnimatedImage),
            _ => None,
        }
    }

    /// Extension used when the source URL carries none
    pub fn default_extension(&self) -> &'static str {
        match self {
            Self::Image => "jpg",
            Self::Video | Self::AnimatedImage => "mp4",
        }
    }

    /// Returns all media kinds
    pub fn all() -> [Self; 3] {
        [Self::Image, Self::Video, Self::AnimatedImage]
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown media type '{}'", s))
    }
}

/// Materialization state of a single attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaState {
    /// Not yet downloaded (or download not requested)
    Unresolved,

    /// Stored locally at the given path
    Resolved { path: PathBuf },

    /// Retrieval was attempted and gave up
    Failed { reason: String },
}

impl MediaState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unresolved => "unresolved",
            Self::Resolved { .. } => "resolved",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for MediaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One attachment of a bookmark
///
/// A reference always carries a media key, a URL, or both. Its state moves
/// exactly once from `Unresolved` to `Resolved` or `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    key: Option<String>,
    url: Option<String>,
    kind: MediaKind,
    state: MediaState,
}

impl MediaRef {
    /// Creates a reference addressed by the feed's media key
    pub fn from_key(key: impl Into<String>, kind: MediaKind, url: Option<String>) -> Self {
        Self {
            key: Some(key.into()),
            url,
            kind,
            state: MediaState::Unresolved,
        }
    }

    /// Creates a reference that only has a URL
    pub fn from_url(url: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            key: None,
            url: Some(url.into()),
            kind,
            state: MediaState::Unresolved,
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn state(&self) -> &MediaState {
        &self.state
    }

    /// Stable identifier used to address the local media artifact
    ///
    /// The media key when present, otherwise the first 16 hex characters of
    /// the SHA-256 of the URL.
    pub fn identifier(&self) -> String {
        match (&self.key, &self.url) {
            (Some(key), _) => sanitize_component(key),
            (None, Some(url)) => {
                let digest = Sha256::digest(url.as_bytes());
                hex::encode(digest)[..16].to_string()
            }
            (None, None) => "_".to_string(),
        }
    }

    /// File extension for the local artifact, taken from the URL path
    pub fn extension(&self) -> String {
        self.url
            .as_deref()
            .and_then(|u| url::Url::parse(u).ok())
            .and_then(|u| {
                Path::new(u.path())
                    .extension()
                    .and_then(|e| e.to_str())
                    .filter(|e| !e.is_empty() && e.len() <= 5)
                    .map(|e| e.to_ascii_lowercase())
            })
            .unwrap_or_else(|| self.kind.default_extension().to_string())
    }

    /// File name of the local artifact: `{identifier}.{extension}`
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.identifier(), self.extension())
    }

    /// Marks the reference as stored locally
    pub fn resolve(&mut self, path: PathBuf) -> Result<(), SyncError> {
        self.settle(MediaState::Resolved { path })
    }

    /// Marks the reference as permanently unavailable for this run
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), SyncError> {
        self.settle(MediaState::Failed {
            reason: reason.into(),
        })
    }

    fn settle(&mut self, next: MediaState) -> Result<(), SyncError> {
        if !self.state.is_unresolved() {
            return Err(SyncError::InvalidTransition {
                from: self.state.label(),
                to: next.label(),
            });
        }
        self.state = next;
        Ok(())
    }
}
