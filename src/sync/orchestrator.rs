//! Sync orchestrator
//!
//! Drives one run: load the cursor, walk the feed, materialize each new
//! record, and commit the cursor. The cursor is written only when the walk
//! completes; a failed run leaves it exactly where it was.

use crate::cursor::{CursorStore, CursorTracker, SyncCursor};
use crate::feed::FeedSource;
use crate::output::{RunStatus, RunSummary};
use crate::record::BookmarkRecord;
use crate::sync::materializer::Materializer;
use crate::sync::media::MediaFetcher;
use crate::sync::pagination::Paginator;
use crate::sync::{RunFailure, SyncOptions};
use crate::SyncError;
use std::collections::HashSet;
use std::fmt;
use std::time::Instant;

/// Phase of a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    LoadingCursor,
    Paginating,
    Materializing,
    CommittingCursor,
    Done,
    Failed,
}

impl SyncPhase {
    /// Returns true if the run may move from `self` to `next`
    ///
    /// `Failed` is only entered from `Paginating` or `CommittingCursor`; a
    /// record that must abort the run hands control back to the walk first.
    pub fn can_transition_to(self, next: SyncPhase) -> bool {
        use SyncPhase::*;
        matches!(
            (self, next),
            (Idle, LoadingCursor)
                | (LoadingCursor, Paginating)
                | (Paginating, Materializing)
                | (Materializing, Paginating)
                | (Paginating, CommittingCursor)
                | (Paginating, Failed)
                | (CommittingCursor, Done)
                | (CommittingCursor, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SyncPhase::Done | SyncPhase::Failed)
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncPhase::Idle => "idle",
            SyncPhase::LoadingCursor => "loading-cursor",
            SyncPhase::Paginating => "paginating",
            SyncPhase::Materializing => "materializing",
            SyncPhase::CommittingCursor => "committing-cursor",
            SyncPhase::Done => "done",
            SyncPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Single-use driver of one sync run
pub struct Orchestrator<'a, F, S, M> {
    feed: &'a F,
    store: &'a S,
    materializer: Materializer<M>,
    options: &'a SyncOptions,
    phase: SyncPhase,
    summary: RunSummary,
}

impl<'a, F, S, M> Orchestrator<'a, F, S, M>
where
    F: FeedSource,
    S: CursorStore,
    M: MediaFetcher,
{
    pub fn new(
        feed: &'a F,
        store: &'a S,
        materializer: Materializer<M>,
        options: &'a SyncOptions,
    ) -> Self {
        Self {
            feed,
            store,
            materializer,
            options,
            phase: SyncPhase::Idle,
            summary: RunSummary::new(),
        }
    }

    /// Executes the run to a terminal phase
    pub async fn run(mut self) -> Result<RunSummary, RunFailure> {
        let started = Instant::now();
        let result = self.execute().await;
        self.summary.duration = started.elapsed();

        match result {
            Ok(()) => {
                self.enter(SyncPhase::Done);
                self.summary.status = RunStatus::Completed;
                tracing::info!(
                    "Sync completed: {} processed, {} skipped, {} failed in {:.2}s",
                    self.summary.processed,
                    self.summary.skipped,
                    self.summary.failed,
                    self.summary.duration.as_secs_f64()
                );
                Ok(self.summary)
            }
            Err(error) => {
                self.enter(SyncPhase::Failed);
                self.summary.status = RunStatus::Failed;
                tracing::error!("Sync failed: {}", error);
                Err(RunFailure {
                    summary: self.summary,
                    error,
                })
            }
        }
    }

    async fn execute(&mut self) -> Result<(), SyncError> {
        self.enter(SyncPhase::LoadingCursor);
        let previous = self.store.load();
        self.summary.cursor_before = previous.as_ref().map(|c| c.id.clone());
        self.summary.cursor_after = self.summary.cursor_before.clone();

        let resume_id = match &previous {
            Some(cursor) if self.options.force_full_resync => {
                tracing::info!(
                    "Full resync requested; ignoring stored cursor {}",
                    cursor.id
                );
                None
            }
            Some(cursor) => {
                tracing::info!("Resuming after bookmark {}", cursor.id);
                Some(cursor.id.clone())
            }
            None => {
                tracing::info!("No stored cursor; walking the whole feed");
                None
            }
        };

        let mut tracker = CursorTracker::new(previous.as_ref());
        let mut seen = HashSet::new();
        let mut pager = Paginator::new(
            self.feed,
            resume_id,
            self.options.page_size,
            self.options.page_retry.clone(),
        );

        self.enter(SyncPhase::Paginating);
        loop {
            let page = pager.next_page().await;
            self.summary.pages = pager.pages_fetched();
            let Some(records) = page? else {
                break;
            };

            tracing::debug!(
                "Page {}: {} records",
                self.summary.pages,
                records.len()
            );

            self.enter(SyncPhase::Materializing);
            for record in records {
                if let Err(error) = self.process(record, &mut tracker, &mut seen).await {
                    self.enter(SyncPhase::Paginating);
                    return Err(error);
                }
            }
            self.enter(SyncPhase::Paginating);
        }
        self.summary.boundary_reached = pager.boundary_reached();
        if pager.boundary_reached() {
            tracker.reached_previous();
        }

        self.enter(SyncPhase::CommittingCursor);
        match tracker.advance_to() {
            Some(id) => {
                self.store
                    .save(&SyncCursor::new(id))
                    .map_err(SyncError::CursorStore)?;
                tracing::info!("Cursor advanced to {}", id);
                self.summary.cursor_after = Some(id.to_string());
            }
            None => tracing::debug!("Cursor unchanged"),
        }

        Ok(())
    }

    /// Handles one record of the walk
    ///
    /// Returns an error only when the record's failure must end the run.
    async fn process(
        &mut self,
        record: BookmarkRecord,
        tracker: &mut CursorTracker,
        seen: &mut HashSet<String>,
    ) -> Result<(), SyncError> {
        if !seen.insert(record.id.clone()) {
            tracing::debug!("Bookmark {} repeated in feed; skipping", record.id);
            self.summary.skipped += 1;
            return Ok(());
        }

        if !self.options.overwrite && self.materializer.artifacts().has_bookmark(&record) {
            tracing::debug!("Bookmark {} already archived", record.id);
            self.summary.skipped += 1;
            tracker.archived(&record.id);
            return Ok(());
        }

        let id = record.id.clone();
        match self.materializer.materialize(record).await {
            Ok(done) => {
                self.summary.processed += 1;
                self.summary.media_downloaded += done.media_downloaded;
                self.summary.media_reused += done.media_reused;
                self.summary.failed_media += done.media_failed;
                tracker.archived(&id);
                tracing::info!("Archived bookmark {} -> {}", id, done.path.display());
                Ok(())
            }
            Err(error) => {
                self.summary.failed += 1;
                tracker.failed(&id);
                let error = SyncError::Record {
                    id,
                    source: Box::new(error),
                };

                if self.options.skip_errors && !error.is_auth() {
                    tracing::warn!("{}", error);
                    Ok(())
                } else {
                    Err(error)
                }
            }
        }
    }

    fn enter(&mut self, next: SyncPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "invalid sync phase transition {} -> {}",
            self.phase,
            next
        );
        tracing::trace!("Sync phase {} -> {}", self.phase, next);
        self.phase = next;
    }
}
