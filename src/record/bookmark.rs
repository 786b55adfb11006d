use crate::record::{sanitize_component, sanitize_identifier, MediaRef};
use chrono::{DateTime, Utc};

/// One bookmarked post as delivered by the feed
///
/// Records are never mutated after they are fetched, with the exception of
/// the materialization state carried by their `MediaRef`s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkRecord {
    /// Opaque identifier, ordered by recency in the feed's pagination order
    pub id: String,

    /// Author handle without the leading `@`
    pub author: String,

    /// When the post was created
    pub created_at: DateTime<Utc>,

    /// Body text
    pub text: String,

    /// Attachments in the order the post declares them
    pub media: Vec<MediaRef>,
}

impl BookmarkRecord {
    /// Creates a record with no media
    pub fn new(
        id: impl Into<String>,
        author: impl Into<String>,
        created_at: DateTime<Utc>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            author: author.into(),
            created_at,
            text: text.into(),
            media: Vec::new(),
        }
    }

    /// Attaches media references to the record
    pub fn with_media(mut self, media: Vec<MediaRef>) -> Self {
        self.media = media;
        self
    }

    /// File stem of the markdown artifact for this record
    ///
    /// Format: `{YYYYMMDD-HHMMSS}-{author}-{id}`. The identifier is always the
    /// last dash-separated component so existing artifacts can be indexed by id.
    pub fn artifact_stem(&self) -> String {
        format!(
            "{}-{}-{}",
            self.created_at.format("%Y%m%d-%H%M%S"),
            sanitize_component(&self.author),
            self.artifact_id()
        )
    }

    /// Identifier as it appears in the artifact file name; never contains `-`
    pub fn artifact_id(&self) -> String {
        sanitize_identifier(&self.id)
    }

    /// Link to the post on the web
    pub fn permalink(&self) -> String {
        format!("https://twitter.com/{}/status/{}", self.author, self.id)
    }

}
