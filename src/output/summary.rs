//! Run summary
//!
//! Counts produced fresh by every run and never persisted.

use std::fmt;
use std::time::Duration;

/// Final status of a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunStatus {
    #[default]
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts and outcome of one sync run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub status: RunStatus,

    /// Pages fetched from the feed
    pub pages: usize,

    /// Records whose document was written in this run
    pub processed: usize,

    /// Records skipped because their document already existed (or repeated in the feed)
    pub skipped: usize,

    /// Records that could not be materialized
    pub failed: usize,

    /// Media items that ended in the failed state
    pub failed_media: usize,

    /// Media items downloaded in this run
    pub media_downloaded: usize,

    /// Media items already present on disk
    pub media_reused: usize,

    /// True when the walk stopped at the previously synced bookmark
    pub boundary_reached: bool,

    pub cursor_before: Option<String>,
    pub cursor_after: Option<String>,

    pub duration: Duration,
}

impl RunSummary {
    /// Creates a new empty summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the cursor moved during the run
    pub fn cursor_advanced(&self) -> bool {
        self.cursor_after != self.cursor_before
    }
}

/// Formats a run summary for the terminal
pub fn format_summary(summary: &RunSummary) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== Sync {} ===\n\n", summary.status));
    out.push_str(&format!("  Pages fetched:     {}\n", summary.pages));
    out.push_str(&format!("  Records processed: {}\n", summary.processed));
    out.push_str(&format!("  Records skipped:   {}\n", summary.skipped));
    out.push_str(&format!("  Records failed:    {}\n", summary.failed));
    out.push_str(&format!(
        "  Media downloaded:  {} (reused {}, failed {})\n",
        summary.media_downloaded, summary.media_reused, summary.failed_media
    ));
    out.push_str(&format!(
        "  Cursor:            {} -> {}\n",
        summary.cursor_before.as_deref().unwrap_or("(none)"),
        summary.cursor_after.as_deref().unwrap_or("(none)")
    ));
    if summary.boundary_reached {
        out.push_str("  Stopped at previously synced bookmark\n");
    }
    out.push_str(&format!(
        "  Duration:          {:.2}s\n",
        summary.duration.as_secs_f64()
    ));

    out
}

/// Prints a run summary to stdout
pub fn print_summary(summary: &RunSummary) {
    print!("{}", format_summary(summary));
}
