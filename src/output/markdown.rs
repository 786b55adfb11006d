//! Markdown rendering of bookmark documents
//!
//! Renders one bookmark as a standalone markdown document: heading, linked
//! body text, timestamp, media section, and a link back to the original post.

use crate::record::{BookmarkRecord, MediaKind};

/// How a media item appears in the rendered document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaLink {
    /// Stored locally; `path` is relative to the document when possible
    Local { kind: MediaKind, path: String },

    /// Not downloaded (disabled or filtered); links to the remote copy
    Remote { kind: MediaKind, url: String },

    /// Download failed; rendered as a placeholder instead of a broken link
    Placeholder {
        kind: MediaKind,
        identifier: String,
        url: Option<String>,
    },
}

impl MediaLink {
    fn to_markdown(&self) -> String {
        match self {
            Self::Local {
                kind: MediaKind::Image,
                path,
            } => format!("- ![{}]({})", MediaKind::Image, path),
            Self::Local { kind, path } => format!("- [{}]({})", kind, path),
            Self::Remote { kind, url } => format!("- [{}]({})", kind, url),
            Self::Placeholder {
                kind,
                identifier,
                url,
            } => match url {
                Some(url) => format!("- *{} unavailable* ({}) [source]({})", kind, identifier, url),
                None => format!("- *{} unavailable* ({})", kind, identifier),
            },
        }
    }
}

/// Renders a bookmark document
///
/// # Arguments
///
/// * `record` - The bookmark to render
/// * `media` - One entry per attachment, in the record's order
///
/// # Returns
///
/// The markdown document, ending with a newline
pub fn render_bookmark(record: &BookmarkRecord, media: &[MediaLink]) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Tweet by @{}\n\n", record.author));
    md.push_str(&format_text(&record.text));
    md.push_str("\n\n");
    md.push_str(&format!(
        "Posted: {}\n",
        record.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    if !media.is_empty() {
        md.push_str("\n## Media\n\n");
        for link in media {
            md.push_str(&link.to_markdown());
            md.push('\n');
        }
    }

    md.push_str(&format!("\n[Original Tweet]({})\n", record.permalink()));

    md
}

/// Links `@mentions` and `#hashtags` in post text
///
/// A marker only starts a link at the beginning of the text or after a
/// non-word character, so e-mail addresses stay untouched.
pub fn format_text(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let at_boundary = i == 0 || !is_word_char(chars[i - 1]);

        if (c == '@' || c == '#') && at_boundary {
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && is_word_char(chars[end]) {
                end += 1;
            }

            if end > start {
                let name: String = chars[start..end].iter().collect();
                if c == '@' {
                    out.push_str(&format!("[@{}](https://twitter.com/{})", name, name));
                } else {
                    out.push_str(&format!(
                        "[#{}](https://twitter.com/hashtag/{})",
                        name, name
                    ));
                }
                i = end;
                continue;
            }
        }

        out.push(c);
        i += 1;
    }

    out
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
