use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Bookmark Mirror
///
/// Every table is optional; missing values take the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Remote feed configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Base URL of the X API
    #[serde(rename = "api-base")]
    pub api_base: String,

    /// Numeric id of the account whose bookmarks are mirrored
    ///
    /// Resolved through `/2/users/me` when absent.
    #[serde(rename = "user-id")]
    pub user_id: Option<String>,

    /// Environment variable holding the bearer credential
    #[serde(rename = "token-env")]
    pub token_env: String,

    /// Number of bookmarks requested per page
    #[serde(rename = "page-size")]
    pub page_size: u32,

    /// Timeout for a single feed request (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.twitter.com".to_string(),
            user_id: None,
            token_env: "X_BEARER_TOKEN".to_string(),
            page_size: 100,
            request_timeout_secs: 30,
        }
    }
}

/// Output layout configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for markdown files
    #[serde(rename = "output-dir")]
    pub output_dir: PathBuf,

    /// Directory for downloaded media (default: `<output-dir>/media`)
    #[serde(rename = "media-dir")]
    pub media_dir: Option<PathBuf>,

    /// Path of the cursor state file
    #[serde(rename = "state-path")]
    pub state_path: PathBuf,
}

impl OutputConfig {
    /// Media directory with the default applied
    pub fn resolved_media_dir(&self) -> PathBuf {
        self.media_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join("media"))
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            media_dir: None,
            state_path: PathBuf::from(".xbm/state.json"),
        }
    }
}

/// Media download configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Whether media files are downloaded at all
    pub download: bool,

    /// Media types to download (`photo`, `video`, `animated_gif`); empty means all
    pub types: Vec<String>,

    /// Maximum size of a single media file (bytes)
    #[serde(rename = "max-bytes")]
    pub max_bytes: u64,

    /// Timeout for a single media download (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Maximum number of concurrent media downloads
    pub workers: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            download: true,
            types: Vec::new(),
            max_bytes: 50 * 1024 * 1024,
            timeout_secs: 30,
            workers: 4,
        }
    }
}

/// Retry behavior for feed pages and media items
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries per feed page after the first attempt
    #[serde(rename = "page-retries")]
    pub page_retries: u32,

    /// Base delay between page attempts (milliseconds)
    #[serde(rename = "page-delay-ms")]
    pub page_delay_ms: u64,

    /// Retries per media item after the first attempt
    #[serde(rename = "media-retries")]
    pub media_retries: u32,

    /// Base delay between media attempts (milliseconds)
    #[serde(rename = "media-delay-ms")]
    pub media_delay_ms: u64,

    /// Longest pause honored for a rate-limit signal (seconds)
    #[serde(rename = "max-rate-limit-wait-secs")]
    pub max_rate_limit_wait_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            page_retries: 2,
            page_delay_ms: 1000,
            media_retries: 2,
            media_delay_ms: 1000,
            max_rate_limit_wait_secs: 900,
        }
    }
}
