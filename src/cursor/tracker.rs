//! Cursor advance rule
//!
//! The feed is walked newest first. A new cursor value must satisfy two
//! conditions so that no unarchived record ever ends up hidden behind it:
//!
//! 1. It is newer (appears earlier in the walk) than the previous cursor.
//! 2. It is older than every record that failed to materialize during the run
//!    above the previous cursor.
//!
//! The tracker keeps the first archived record seen after the most recent
//! failure, and stops accepting candidates once the walk reaches the
//! previous cursor. A record archived after a failure is only known to be
//! newer than the previous cursor if the walk reaches it; when it never does
//! (the bookmark left the feed), such a candidate is rejected.

use crate::cursor::SyncCursor;

/// Tracks which identifier the cursor may advance to at the end of a run
#[derive(Debug, Clone, Default)]
pub struct CursorTracker {
    previous: Option<String>,
    candidate: Option<String>,
    passed_previous: bool,
    /// A record failed before the walk reached the previous cursor
    failed_above_previous: bool,
}

impl CursorTracker {
    /// Creates a tracker for a run that started from `previous`
    pub fn new(previous: Option<&SyncCursor>) -> Self {
        Self {
            previous: previous.map(|c| c.id.clone()),
            candidate: None,
            passed_previous: false,
            failed_above_previous: false,
        }
    }

    /// Records that the walk stopped at the previous cursor without yielding it
    pub fn reached_previous(&mut self) {
        self.passed_previous = true;
    }

    /// Records that `id` is archived (written this run or already on disk)
    pub fn archived(&mut self, id: &str) {
        if self.is_previous(id) {
            self.passed_previous = true;
            return;
        }
        if self.passed_previous {
            return;
        }
        if self.candidate.is_none() {
            self.candidate = Some(id.to_string());
        }
    }

    /// Records that `id` failed to materialize
    pub fn failed(&mut self, id: &str) {
        if !self.passed_previous {
            self.candidate = None;
            self.failed_above_previous = true;
        }
        if self.is_previous(id) {
            self.passed_previous = true;
        }
    }

    /// Identifier the cursor should move to, if it should move at all
    pub fn advance_to(&self) -> Option<&str> {
        match (&self.candidate, &self.previous) {
            (Some(candidate), Some(previous)) if candidate == previous => None,
            (Some(_), Some(_)) if self.failed_above_previous && !self.passed_previous => None,
            (Some(candidate), _) => Some(candidate.as_str()),
            (None, _) => None,
        }
    }

    fn is_previous(&self, id: &str) -> bool {
        self.previous.as_deref() == Some(id)
    }
}
