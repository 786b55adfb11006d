//! Record materializer
//!
//! Turns one feed record into a markdown document plus its media files.
//! Media items are downloaded concurrently, each under its own retry
//! budget and timeout. A failed item is recorded on its reference and
//! rendered as a placeholder; it never fails the record. The document is
//! written only after every media item has settled.

use crate::output::{render_bookmark, MediaLink};
use crate::record::{BookmarkRecord, MediaKind, MediaRef, MediaState};
use crate::storage::ArtifactStore;
use crate::sync::media::{MediaError, MediaFetcher, MediaLimits};
use crate::sync::retry::{RetryDecision, RetryPolicy};
use crate::SyncError;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Default number of concurrent media downloads
pub const DEFAULT_WORKERS: usize = 4;

/// Outcome of materializing one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedRecord {
    /// Path of the written document
    pub path: PathBuf,

    /// Media downloaded during this call
    pub media_downloaded: usize,

    /// Media already present on disk
    pub media_reused: usize,

    /// Media that ended in the failed state
    pub media_failed: usize,

    /// Media left remote (download disabled or type not selected)
    pub media_linked: usize,
}

/// Converts bookmark records into local artifacts
pub struct Materializer<M> {
    fetcher: Arc<M>,
    artifacts: ArtifactStore,
    policy: RetryPolicy,
    limits: MediaLimits,
    download: bool,
    /// Kinds selected for download; empty selects every kind
    media_types: HashSet<MediaKind>,
    workers: Arc<Semaphore>,
}

impl<M: MediaFetcher> Materializer<M> {
    pub fn new(fetcher: Arc<M>, artifacts: ArtifactStore) -> Self {
        Self {
            fetcher,
            artifacts,
            policy: RetryPolicy::default(),
            limits: MediaLimits::default(),
            download: true,
            media_types: HashSet::new(),
            workers: Arc::new(Semaphore::new(DEFAULT_WORKERS)),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_limits(mut self, limits: MediaLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_download(mut self, download: bool) -> Self {
        self.download = download;
        self
    }

    pub fn with_media_types(mut self, media_types: HashSet<MediaKind>) -> Self {
        self.media_types = media_types;
        self
    }

    /// Bounds concurrent downloads across every record this materializer handles
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Arc::new(Semaphore::new(workers.max(1)));
        self
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Returns true if media of `kind` should be downloaded
    pub fn wants(&self, kind: MediaKind) -> bool {
        self.download && (self.media_types.is_empty() || self.media_types.contains(&kind))
    }

    /// Materializes one record
    ///
    /// # Returns
    ///
    /// * `Ok(MaterializedRecord)` - Document written; media failures are counted, not raised
    /// * `Err(SyncError)` - The media directory or the document could not be written
    pub async fn materialize(&self, mut record: BookmarkRecord) -> Result<MaterializedRecord, SyncError> {
        let mut media_reused = 0;
        let mut media_linked = 0;
        let mut media_downloaded = 0;

        if record.media.iter().any(|m| self.wants(m.kind())) {
            self.artifacts.ensure_media_dir()?;
        }

        let mut tasks = JoinSet::new();
        let mut spawned = Vec::new();

        for (index, media) in record.media.iter_mut().enumerate() {
            if !self.wants(media.kind()) {
                media_linked += 1;
                continue;
            }

            if self.artifacts.has_media(media) {
                let path = self.artifacts.media_path(media);
                tracing::debug!("Reusing stored media {}", path.display());
                media.resolve(path)?;
                media_reused += 1;
                continue;
            }

            let url = media.url().map(str::to_string);
            let Some(url) = url else {
                tracing::warn!(
                    "Media {} of bookmark {} has no URL",
                    media.identifier(),
                    record.id
                );
                media.fail(MediaError::MissingUrl.to_string())?;
                continue;
            };

            let job = MediaJob {
                fetcher: Arc::clone(&self.fetcher),
                artifacts: self.artifacts.clone(),
                media: media.clone(),
                url,
                policy: self.policy.clone(),
                limits: self.limits,
                workers: Arc::clone(&self.workers),
            };
            tasks.spawn(async move { (index, job.run().await) });
            spawned.push(index);
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(path))) => {
                    record.media[index].resolve(path)?;
                    media_downloaded += 1;
                }
                Ok((index, Err(e))) => {
                    let media = &mut record.media[index];
                    tracing::warn!(
                        "Media {} of bookmark {} failed: {}",
                        media.identifier(),
                        record.id,
                        e
                    );
                    media.fail(e.to_string())?;
                }
                Err(e) => {
                    tracing::error!("Media task for bookmark {} panicked: {}", record.id, e);
                }
            }
        }

        for index in spawned {
            let media = &mut record.media[index];
            if media.state().is_unresolved() {
                media.fail(MediaError::Task("download task aborted".to_string()).to_string())?;
            }
        }

        let media_failed = record.media.iter().filter(|m| m.state().is_failed()).count();
        let links: Vec<MediaLink> = record.media.iter().map(|m| self.link_for(m)).collect();
        let markdown = render_bookmark(&record, &links);
        let path = self.artifacts.write_bookmark(&record, &markdown)?;

        tracing::debug!(
            "Wrote {} ({} media downloaded, {} reused, {} failed)",
            path.display(),
            media_downloaded,
            media_reused,
            media_failed
        );

        Ok(MaterializedRecord {
            path,
            media_downloaded,
            media_reused,
            media_failed,
            media_linked,
        })
    }

    fn link_for(&self, media: &MediaRef) -> MediaLink {
        let kind = media.kind();
        match (media.state(), media.url()) {
            (MediaState::Resolved { path }, _) => MediaLink::Local {
                kind,
                path: self.artifacts.link_to(path),
            },
            (MediaState::Unresolved, Some(url)) => MediaLink::Remote {
                kind,
                url: url.to_string(),
            },
            (MediaState::Unresolved, None) | (MediaState::Failed { .. }, _) => {
                MediaLink::Placeholder {
                    kind,
                    identifier: media.identifier(),
                    url: media.url().map(str::to_string),
                }
            }
        }
    }
}

/// Download of a single media item, owned by its task
struct MediaJob<M> {
    fetcher: Arc<M>,
    artifacts: ArtifactStore,
    media: MediaRef,
    url: String,
    policy: RetryPolicy,
    limits: MediaLimits,
    workers: Arc<Semaphore>,
}

impl<M: MediaFetcher> MediaJob<M> {
    async fn run(self) -> Result<PathBuf, MediaError> {
        let _permit = Arc::clone(&self.workers)
            .acquire_owned()
            .await
            .map_err(|e| MediaError::Task(e.to_string()))?;

        let label = format!("Downloading {}", self.url);
        let limits = self.limits;

        let bytes = self
            .policy
            .run(
                &label,
                |_attempt| {
                    let fetcher = Arc::clone(&self.fetcher);
                    let url = self.url.clone();
                    async move { fetch_with_limits(fetcher.as_ref(), &url, limits).await }
                },
                classify_media_error,
            )
            .await
            .map_err(|e| e.error)?;

        let artifacts = self.artifacts;
        let media = self.media;
        let path = tokio::task::spawn_blocking(move || artifacts.write_media(&media, &bytes))
            .await
            .map_err(|e| MediaError::Task(e.to_string()))??;

        Ok(path)
    }
}

/// One download attempt under the per-item timeout and size ceiling
async fn fetch_with_limits<M: MediaFetcher>(
    fetcher: &M,
    url: &str,
    limits: MediaLimits,
) -> Result<Vec<u8>, MediaError> {
    let bytes = match tokio::time::timeout(limits.timeout, fetcher.fetch(url, limits.max_bytes)).await
    {
        Ok(result) => result?,
        Err(_) => return Err(MediaError::Timeout(limits.timeout)),
    };

    if bytes.len() as u64 > limits.max_bytes {
        return Err(MediaError::TooLarge {
            limit: limits.max_bytes,
        });
    }

    Ok(bytes)
}

fn classify_media_error(error: &MediaError) -> RetryDecision {
    if error.is_retryable() {
        RetryDecision::Retry
    } else {
        RetryDecision::Abort
    }
}
