//! Integration tests for the sync engine
//!
//! Most tests drive `run_sync` with an in-memory feed and media fetcher
//! against a temporary output directory. The wiremock tests at the end run
//! the real HTTP clients against a mock API.

use bookmark_mirror::cursor::MemoryCursorStore;
use bookmark_mirror::feed::build_http_client;
use bookmark_mirror::storage::{StorageError, StorageResult};
use bookmark_mirror::sync::{
    run_sync, HttpMediaFetcher, MediaError, MediaFetcher, RetryPolicy, SyncOptions,
};
use bookmark_mirror::{
    ArtifactStore, BookmarkRecord, CursorStore, FeedError, FeedPage, FeedSource, MediaKind,
    MediaRef, RunStatus, SyncCursor, SyncError, XFeedClient,
};
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Feed serving fixed pages; the page token is the page index
struct FakeFeed {
    pages: Vec<Vec<BookmarkRecord>>,
    failing_page: Option<usize>,
    calls: AtomicUsize,
}

impl FakeFeed {
    fn new(pages: Vec<Vec<BookmarkRecord>>) -> Self {
        Self {
            pages,
            failing_page: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Page `index` (0-based) fails with a transient error on every attempt
    fn failing_at(mut self, index: usize) -> Self {
        self.failing_page = Some(index);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FeedSource for FakeFeed {
    async fn fetch_page(
        &self,
        page_token: Option<&str>,
        _page_size: u32,
    ) -> Result<FeedPage, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let index = page_token.and_then(|t| t.parse::<usize>().ok()).unwrap_or(0);

        if self.failing_page == Some(index) {
            return Err(FeedError::Transient("connection reset".to_string()));
        }

        let records = self.pages.get(index).cloned().unwrap_or_default();
        let next = (index + 1 < self.pages.len()).then(|| (index + 1).to_string());
        Ok(FeedPage::new(records, next))
    }
}

/// Fetcher that echoes the URL as the body, failing for selected URLs
#[derive(Default)]
struct FakeFetcher {
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    fn failing(urls: &[&str]) -> Self {
        Self {
            failing: urls.iter().map(|u| u.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl MediaFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, _max_bytes: u64) -> Result<Vec<u8>, MediaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(url) {
            Err(MediaError::Status(404))
        } else {
            Ok(url.as_bytes().to_vec())
        }
    }
}

/// Cursor store whose writes always fail
struct ReadOnlyStore;

impl CursorStore for ReadOnlyStore {
    fn load(&self) -> Option<SyncCursor> {
        None
    }

    fn save(&self, _cursor: &SyncCursor) -> StorageResult<()> {
        Err(StorageError::InvalidPath(PathBuf::from("/read-only/state.json")))
    }
}

fn rec(id: u32) -> BookmarkRecord {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    BookmarkRecord::new(
        id.to_string(),
        "alice",
        base + ChronoDuration::minutes(id as i64),
        format!("bookmark number {}", id),
    )
}

fn pages(layout: &[&[u32]]) -> Vec<Vec<BookmarkRecord>> {
    layout
        .iter()
        .map(|page| page.iter().map(|id| rec(*id)).collect())
        .collect()
}

fn options() -> SyncOptions {
    SyncOptions {
        page_retry: RetryPolicy::immediate(2),
        media_retry: RetryPolicy::immediate(1),
        ..SyncOptions::default()
    }
}

fn open(dir: &TempDir) -> ArtifactStore {
    ArtifactStore::open(dir.path(), dir.path().join("media")).unwrap()
}

fn stored_cursor(id: &str) -> MemoryCursorStore {
    MemoryCursorStore::new(Some(SyncCursor::new(id)))
}

fn documents(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".md"))
        .collect();
    names.sort();
    names
}

fn archived_ids(dir: &Path) -> Vec<String> {
    let mut ids: Vec<String> = documents(dir)
        .iter()
        .filter_map(|name| name.strip_suffix(".md"))
        .filter_map(|stem| stem.rsplit_once('-').map(|(_, id)| id.to_string()))
        .collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn test_first_run_archives_everything() {
    let dir = TempDir::new().unwrap();
    let feed = FakeFeed::new(pages(&[&[8, 7], &[6, 5], &[4]]));
    let store = MemoryCursorStore::default();
    let fetcher = Arc::new(FakeFetcher::default());

    let summary = run_sync(&feed, &store, open(&dir), fetcher, &options())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.pages, 3);
    assert_eq!(summary.processed, 5);
    assert_eq!(summary.cursor_after.as_deref(), Some("8"));
    assert_eq!(store.current_id().as_deref(), Some("8"));
    assert_eq!(archived_ids(dir.path()), vec!["4", "5", "6", "7", "8"]);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let feed = FakeFeed::new(pages(&[&[8, 7], &[6, 5], &[4]]));
    let store = MemoryCursorStore::default();
    let fetcher = Arc::new(FakeFetcher::default());

    run_sync(&feed, &store, open(&dir), Arc::clone(&fetcher), &options())
        .await
        .unwrap();
    let before = documents(dir.path());

    let summary = run_sync(&feed, &store, open(&dir), fetcher, &options())
        .await
        .unwrap();

    assert_eq!(summary.processed, 0);
    assert_eq!(summary.pages, 1);
    assert!(summary.boundary_reached);
    assert!(!summary.cursor_advanced());
    assert_eq!(documents(dir.path()), before);
    assert_eq!(store.current_id().as_deref(), Some("8"));
}

#[tokio::test]
async fn test_resume_stops_at_cursor() {
    let dir = TempDir::new().unwrap();
    let feed = FakeFeed::new(pages(&[&[8, 7], &[6, 5, 4]]));
    let store = stored_cursor("5");
    let fetcher = Arc::new(FakeFetcher::default());

    let summary = run_sync(&feed, &store, open(&dir), fetcher, &options())
        .await
        .unwrap();

    assert_eq!(summary.processed, 3);
    assert!(summary.boundary_reached);
    assert_eq!(feed.calls(), 2);
    assert_eq!(archived_ids(dir.path()), vec!["6", "7", "8"]);
    assert_eq!(store.current_id().as_deref(), Some("8"));
}

#[tokio::test]
async fn test_failed_page_leaves_cursor_and_next_run_fills_gap() {
    let dir = TempDir::new().unwrap();
    let store = stored_cursor("3");
    let fetcher = Arc::new(FakeFetcher::default());
    let layout = pages(&[&[9, 8], &[7, 6], &[5, 4, 3]]);

    let broken = FakeFeed::new(layout.clone()).failing_at(1);
    let failure = run_sync(&broken, &store, open(&dir), Arc::clone(&fetcher), &options())
        .await
        .unwrap_err();

    assert!(matches!(
        failure.error,
        SyncError::PageExhausted {
            page: 2,
            attempts: 3,
            ..
        }
    ));
    assert_eq!(failure.summary.status, RunStatus::Failed);
    assert_eq!(failure.summary.processed, 2);
    assert_eq!(store.current_id().as_deref(), Some("3"));

    let healthy = FakeFeed::new(layout);
    let summary = run_sync(&healthy, &store, open(&dir), fetcher, &options())
        .await
        .unwrap();

    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.processed, 4);
    assert_eq!(archived_ids(dir.path()), vec!["4", "5", "6", "7", "8", "9"]);
    assert_eq!(store.current_id().as_deref(), Some("9"));
}

#[tokio::test]
async fn test_force_resync_writes_nothing_when_archived() {
    let dir = TempDir::new().unwrap();
    let feed = FakeFeed::new(pages(&[&[8, 7], &[6, 5]]));
    let store = MemoryCursorStore::default();
    let fetcher = Arc::new(FakeFetcher::default());

    run_sync(&feed, &store, open(&dir), Arc::clone(&fetcher), &options())
        .await
        .unwrap();

    let force = SyncOptions {
        force_full_resync: true,
        ..options()
    };
    let summary = run_sync(&feed, &store, open(&dir), fetcher, &force)
        .await
        .unwrap();

    assert_eq!(summary.pages, 2);
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.skipped, 4);
    assert!(!summary.boundary_reached);
    assert_eq!(store.current_id().as_deref(), Some("8"));
}

#[tokio::test]
async fn test_force_resync_walks_past_cursor() {
    let dir = TempDir::new().unwrap();
    let feed = FakeFeed::new(pages(&[&[9, 8], &[7, 6]]));
    let store = stored_cursor("7");
    let fetcher = Arc::new(FakeFetcher::default());

    let force = SyncOptions {
        force_full_resync: true,
        ..options()
    };
    let summary = run_sync(&feed, &store, open(&dir), fetcher, &force)
        .await
        .unwrap();

    assert_eq!(summary.pages, 2);
    assert_eq!(summary.processed, 4);
    assert!(!summary.boundary_reached);
    assert_eq!(store.current_id().as_deref(), Some("9"));
}

#[tokio::test]
async fn test_force_resync_never_moves_cursor_backwards() {
    let dir = TempDir::new().unwrap();
    let feed = FakeFeed::new(pages(&[&[9, 8, 7]]));
    let store = stored_cursor("8");
    let fetcher = Arc::new(FakeFetcher::default());

    // A directory in place of the newest document makes its write fail
    let artifacts = open(&dir);
    std::fs::create_dir_all(artifacts.bookmark_path(&rec(9))).unwrap();

    let force = SyncOptions {
        force_full_resync: true,
        overwrite: true,
        ..options()
    };
    let summary = run_sync(&feed, &store, artifacts, fetcher, &force)
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.processed, 2);
    assert!(!summary.cursor_advanced());
    assert_eq!(store.current_id().as_deref(), Some("8"));
}

#[tokio::test]
async fn test_unbookmarked_cursor_with_failure_stays_put() {
    let dir = TempDir::new().unwrap();
    // Bookmark 5 was removed from the feed, so the walk never reaches it
    let feed = FakeFeed::new(pages(&[&[9, 8, 4, 3]]));
    let store = stored_cursor("5");
    let fetcher = Arc::new(FakeFetcher::default());

    let artifacts = open(&dir);
    std::fs::create_dir_all(artifacts.bookmark_path(&rec(4))).unwrap();

    let overwrite = SyncOptions {
        overwrite: true,
        ..options()
    };
    let summary = run_sync(&feed, &store, artifacts, fetcher, &overwrite)
        .await
        .unwrap();

    assert!(!summary.boundary_reached);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.processed, 3);
    assert_eq!(store.current_id().as_deref(), Some("5"));
}

#[tokio::test]
async fn test_failure_above_reached_cursor_advances_below_it() {
    let dir = TempDir::new().unwrap();
    let feed = FakeFeed::new(pages(&[&[6, 5, 4, 3]]));
    let store = stored_cursor("3");
    let fetcher = Arc::new(FakeFetcher::default());

    let artifacts = open(&dir);
    std::fs::create_dir_all(artifacts.bookmark_path(&rec(5))).unwrap();

    let overwrite = SyncOptions {
        overwrite: true,
        ..options()
    };
    let summary = run_sync(&feed, &store, artifacts, fetcher, &overwrite)
        .await
        .unwrap();

    assert!(summary.boundary_reached);
    assert_eq!(summary.failed, 1);
    assert_eq!(store.current_id().as_deref(), Some("4"));
}

#[tokio::test]
async fn test_overwrite_rewrites_documents() {
    let dir = TempDir::new().unwrap();
    let feed = FakeFeed::new(pages(&[&[2, 1]]));
    let store = MemoryCursorStore::default();
    let fetcher = Arc::new(FakeFetcher::default());

    let artifacts = open(&dir);
    let doc = artifacts.bookmark_path(&rec(2));
    std::fs::write(&doc, "stale").unwrap();

    let overwrite = SyncOptions {
        force_full_resync: true,
        overwrite: true,
        ..options()
    };
    let summary = run_sync(&feed, &store, artifacts, fetcher, &overwrite)
        .await
        .unwrap();

    assert_eq!(summary.processed, 2);
    assert!(std::fs::read_to_string(&doc).unwrap().contains("bookmark number 2"));
}

#[tokio::test]
async fn test_media_failure_is_isolated() {
    let dir = TempDir::new().unwrap();
    let media: Vec<MediaRef> = (1..=3)
        .map(|n| {
            MediaRef::from_key(
                format!("3_{}", n),
                MediaKind::Image,
                Some(format!("https://pbs.example.com/{}.jpg", n)),
            )
        })
        .collect();
    let feed = FakeFeed::new(vec![vec![rec(1).with_media(media)]]);
    let store = MemoryCursorStore::default();
    let fetcher = Arc::new(FakeFetcher::failing(&["https://pbs.example.com/2.jpg"]));

    let summary = run_sync(&feed, &store, open(&dir), fetcher, &options())
        .await
        .unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.failed_media, 1);
    assert_eq!(summary.media_downloaded, 2);
    assert_eq!(store.current_id().as_deref(), Some("1"));

    assert!(dir.path().join("media/3_1.jpg").is_file());
    assert!(!dir.path().join("media/3_2.jpg").exists());
    assert!(dir.path().join("media/3_3.jpg").is_file());

    let doc = std::fs::read_to_string(open(&dir).bookmark_path(&rec(1))).unwrap();
    assert!(doc.contains("- ![photo](media/3_1.jpg)"));
    assert!(doc.contains("*photo unavailable* (3_2)"));
    assert!(doc.contains("- ![photo](media/3_3.jpg)"));
}

#[tokio::test]
async fn test_record_failure_holds_cursor_below_it() {
    let dir = TempDir::new().unwrap();
    let feed = FakeFeed::new(pages(&[&[3, 2, 1]]));
    let store = MemoryCursorStore::default();
    let fetcher = Arc::new(FakeFetcher::default());

    // A directory in place of the document makes the write fail
    let artifacts = open(&dir);
    std::fs::create_dir_all(artifacts.bookmark_path(&rec(3))).unwrap();

    let overwrite = SyncOptions {
        overwrite: true,
        ..options()
    };
    let summary = run_sync(&feed, &store, artifacts, fetcher, &overwrite)
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.processed, 2);
    assert_eq!(store.current_id().as_deref(), Some("2"));
}

#[tokio::test]
async fn test_fail_fast_aborts_on_record_failure() {
    let dir = TempDir::new().unwrap();
    let feed = FakeFeed::new(pages(&[&[3, 2, 1]]));
    let store = MemoryCursorStore::default();
    let fetcher = Arc::new(FakeFetcher::default());

    let artifacts = open(&dir);
    std::fs::create_dir_all(artifacts.bookmark_path(&rec(2))).unwrap();

    let strict = SyncOptions {
        overwrite: true,
        skip_errors: false,
        ..options()
    };
    let failure = run_sync(&feed, &store, artifacts, fetcher, &strict)
        .await
        .unwrap_err();

    assert!(matches!(failure.error, SyncError::Record { ref id, .. } if id == "2"));
    assert_eq!(failure.summary.processed, 1);
    assert!(store.current_id().is_none());
}

#[tokio::test]
async fn test_repeated_record_is_processed_once() {
    let dir = TempDir::new().unwrap();
    let feed = FakeFeed::new(pages(&[&[3, 2], &[2, 1]]));
    let store = MemoryCursorStore::default();
    let fetcher = Arc::new(FakeFetcher::default());

    let summary = run_sync(&feed, &store, open(&dir), fetcher, &options())
        .await
        .unwrap();

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.skipped, 1);
    assert_eq!(archived_ids(dir.path()), vec!["1", "2", "3"]);
}

#[tokio::test]
async fn test_unwritable_cursor_fails_run() {
    let dir = TempDir::new().unwrap();
    let feed = FakeFeed::new(pages(&[&[1]]));
    let fetcher = Arc::new(FakeFetcher::default());

    let failure = run_sync(&feed, &ReadOnlyStore, open(&dir), fetcher, &options())
        .await
        .unwrap_err();

    assert!(matches!(failure.error, SyncError::CursorStore(_)));
    assert_eq!(failure.summary.processed, 1);
}

#[tokio::test]
async fn test_download_disabled_fetches_nothing() {
    let dir = TempDir::new().unwrap();
    let media = MediaRef::from_key(
        "3_1",
        MediaKind::Image,
        Some("https://pbs.example.com/1.jpg".to_string()),
    );
    let feed = FakeFeed::new(vec![vec![rec(1).with_media(vec![media])]]);
    let store = MemoryCursorStore::default();
    let fetcher = Arc::new(FakeFetcher::default());

    let no_media = SyncOptions {
        download_media: false,
        ..options()
    };
    let summary = run_sync(&feed, &store, open(&dir), Arc::clone(&fetcher), &no_media)
        .await
        .unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed_media, 0);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}

fn bookmarks_body(base: &str) -> serde_json::Value {
    serde_json::json!({
        "data": [{
            "id": "1800",
            "text": "Reading @rustlang docs #async",
            "author_id": "7",
            "created_at": "2024-02-10T08:15:00.000Z",
            "attachments": {"media_keys": ["3_1"]}
        }],
        "includes": {
            "users": [{"id": "7", "username": "ferris"}],
            "media": [{
                "media_key": "3_1",
                "type": "photo",
                "url": format!("{}/media/crab.png", base)
            }]
        },
        "meta": {"result_count": 1}
    })
}

fn client_for(server: &MockServer) -> XFeedClient {
    let client = build_http_client(Duration::from_secs(5)).unwrap();
    XFeedClient::new(client, &server.uri(), "test-token", "42")
}

#[tokio::test]
async fn test_http_feed_and_media_end_to_end() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/2/users/42/bookmarks"))
        .and(header("authorization", "Bearer test-token"))
        .and(query_param("max_results", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bookmarks_body(&server.uri())))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/media/crab.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png-bytes".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = MemoryCursorStore::default();
    let feed = client_for(&server);
    let fetcher = Arc::new(HttpMediaFetcher::new(
        build_http_client(Duration::from_secs(5)).unwrap(),
        Duration::from_secs(5),
    ));

    let summary = run_sync(&feed, &store, open(&dir), fetcher, &options())
        .await
        .unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.media_downloaded, 1);
    assert_eq!(store.current_id().as_deref(), Some("1800"));
    assert_eq!(
        std::fs::read(dir.path().join("media/3_1.png")).unwrap(),
        b"png-bytes"
    );

    let doc = std::fs::read_to_string(dir.path().join("20240210-081500-ferris-1800.md")).unwrap();
    assert!(doc.starts_with("# Tweet by @ferris\n"));
    assert!(doc.contains("[@rustlang](https://twitter.com/rustlang)"));
    assert!(doc.contains("[#async](https://twitter.com/hashtag/async)"));
    assert!(doc.contains("- ![photo](media/3_1.png)"));
    assert!(doc.contains("[Original Tweet](https://twitter.com/ferris/status/1800)"));
}

#[tokio::test]
async fn test_rate_limited_page_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/2/users/42/bookmarks"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/2/users/42/bookmarks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bookmarks_body(&server.uri())))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = MemoryCursorStore::default();
    let feed = client_for(&server);

    let no_media = SyncOptions {
        download_media: false,
        ..options()
    };
    let summary = run_sync(
        &feed,
        &store,
        open(&dir),
        Arc::new(FakeFetcher::default()),
        &no_media,
    )
    .await
    .unwrap();

    assert_eq!(summary.processed, 1);
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn test_rejected_credentials_fail_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/2/users/42/bookmarks"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = stored_cursor("5");
    let feed = client_for(&server);

    let patient = SyncOptions {
        page_retry: RetryPolicy::immediate(5),
        ..options()
    };
    let failure = run_sync(
        &feed,
        &store,
        open(&dir),
        Arc::new(FakeFetcher::default()),
        &patient,
    )
    .await
    .unwrap_err();

    assert!(failure.error.is_auth());
    assert_eq!(failure.summary.pages, 0);
    assert_eq!(store.current_id().as_deref(), Some("5"));
    assert!(documents(dir.path()).is_empty());
}
