//! X API v2 bookmark feed
//!
//! This module handles all HTTP requests to the bookmarks endpoint, including:
//! - Building the HTTP client with a proper user agent
//! - Resolving the authenticated account's id
//! - Fetching and decoding bookmark pages with their expansions
//! - Classifying failures into auth, rate-limit, transient and fatal errors

use crate::config::FeedConfig;
use crate::feed::{FeedError, FeedPage, FeedSource};
use crate::record::{BookmarkRecord, MediaKind, MediaRef};
use crate::{ConfigError, SyncError};
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const EXPANSIONS: &str = "author_id,attachments.media_keys";
const TWEET_FIELDS: &str = "created_at,text,attachments";
const MEDIA_FIELDS: &str = "type,url,preview_image_url,variants";
const USER_FIELDS: &str = "name,username";

/// Builds an HTTP client for feed and media requests
///
/// # Arguments
///
/// * `timeout` - Overall timeout for a single request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("bookmark-mirror/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Client for the X API v2 bookmarks endpoint
#[derive(Debug, Clone)]
pub struct XFeedClient {
    client: Client,
    api_base: String,
    token: String,
    user_id: String,
}

impl XFeedClient {
    /// Creates a client for a known account
    pub fn new(
        client: Client,
        api_base: &str,
        token: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.into(),
            user_id: user_id.into(),
        }
    }

    /// Builds a client from configuration
    ///
    /// Reads the bearer credential from the configured environment variable
    /// and resolves the account id through `/2/users/me` when not configured.
    pub async fn connect(config: &FeedConfig) -> Result<Self, SyncError> {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingToken(config.token_env.clone()))?;

        let client = build_http_client(Duration::from_secs(config.request_timeout_secs))?;

        let user_id = match &config.user_id {
            Some(id) => id.clone(),
            None => {
                let id = resolve_user_id(&client, &config.api_base, &token)
                    .await
                    .map_err(FeedError::into_sync_error)?;
                tracing::info!("Resolved authenticated account id: {}", id);
                id
            }
        };

        Ok(Self::new(client, &config.api_base, token, user_id))
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn bookmarks_url(&self) -> String {
        format!("{}/2/users/{}/bookmarks", self.api_base, self.user_id)
    }
}

impl FeedSource for XFeedClient {
    async fn fetch_page(
        &self,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<FeedPage, FeedError> {
        let mut query = vec![
            ("max_results", page_size.to_string()),
            ("expansions", EXPANSIONS.to_string()),
            ("tweet.fields", TWEET_FIELDS.to_string()),
            ("media.fields", MEDIA_FIELDS.to_string()),
            ("user.fields", USER_FIELDS.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pagination_token", token.to_string()));
        }

        let response: BookmarksResponse =
            get_json(&self.client, &self.bookmarks_url(), &query, &self.token).await?;

        into_page(response)
    }
}

/// Looks up the id of the account that owns `token`
pub async fn resolve_user_id(
    client: &Client,
    api_base: &str,
    token: &str,
) -> Result<String, FeedError> {
    let url = format!("{}/2/users/me", api_base.trim_end_matches('/'));
    let response: MeResponse = get_json(client, &url, &[], token).await?;
    Ok(response.data.id)
}

/// Sends an authenticated GET and decodes the JSON body
async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
    token: &str,
) -> Result<T, FeedError> {
    let response = client
        .get(url)
        .bearer_auth(token)
        .query(query)
        .send()
        .await
        .map_err(classify_request_error)?;

    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = parse_retry_after(response.headers(), Utc::now().timestamp());
        return Err(FeedError::RateLimited { retry_after });
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        let message = response.text().await.unwrap_or_default();
        return Err(FeedError::Auth {
            status: status.as_u16(),
            message: truncate(&message, 200),
        });
    }

    if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        return Err(FeedError::Transient(format!("HTTP {}", status.as_u16())));
    }

    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(FeedError::Rejected {
            status: status.as_u16(),
            message: truncate(&message, 200),
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| FeedError::Transient(format!("failed to read body: {}", e)))?;

    serde_json::from_str(&body).map_err(|e| FeedError::Malformed(e.to_string()))
}

/// Maps a request-level failure to a feed error
fn classify_request_error(e: reqwest::Error) -> FeedError {
    if e.is_timeout() {
        FeedError::Transient("request timeout".to_string())
    } else if e.is_connect() {
        FeedError::Transient(format!("connection failed: {}", e))
    } else if e.is_decode() {
        FeedError::Malformed(e.to_string())
    } else {
        FeedError::Transient(e.to_string())
    }
}

/// Extracts the delay requested by a rate-limit response
///
/// Honors `retry-after` (seconds) first, then `x-rate-limit-reset`
/// (epoch seconds) relative to `now_epoch`.
pub fn parse_retry_after(headers: &HeaderMap, now_epoch: i64) -> Option<Duration> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
    };

    if let Some(secs) = header("retry-after") {
        return Some(Duration::from_secs(secs.max(0) as u64));
    }

    header("x-rate-limit-reset").map(|reset| Duration::from_secs((reset - now_epoch).max(0) as u64))
}

fn truncate(message: &str, max_chars: usize) -> String {
    let trimmed = message.trim();
    if trimmed.chars().count() <= max_chars {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}

// ===== Wire format =====

#[derive(Debug, Deserialize)]
struct MeResponse {
    data: ApiUser,
}

#[derive(Debug, Deserialize)]
struct BookmarksResponse {
    #[serde(default)]
    data: Vec<ApiTweet>,
    #[serde(default)]
    includes: ApiIncludes,
    #[serde(default)]
    meta: ApiMeta,
}

#[derive(Debug, Deserialize)]
struct ApiTweet {
    id: String,
    #[serde(default)]
    text: String,
    author_id: Option<String>,
    created_at: Option<DateTime<Utc>>,
    attachments: Option<ApiAttachments>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiAttachments {
    #[serde(default)]
    media_keys: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiIncludes {
    #[serde(default)]
    users: Vec<ApiUser>,
    #[serde(default)]
    media: Vec<ApiMedia>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
    #[serde(default)]
    username: String,
}

#[derive(Debug, Deserialize)]
struct ApiMedia {
    media_key: String,
    #[serde(rename = "type")]
    kind: String,
    url: Option<String>,
    preview_image_url: Option<String>,
    #[serde(default)]
    variants: Vec<ApiVariant>,
}

#[derive(Debug, Deserialize)]
struct ApiVariant {
    bit_rate: Option<u64>,
    #[serde(default)]
    content_type: String,
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiMeta {
    next_token: Option<String>,
}

/// Joins tweets with their expansions into bookmark records
fn into_page(response: BookmarksResponse) -> Result<FeedPage, FeedError> {
    let users: HashMap<&str, &str> = response
        .includes
        .users
        .iter()
        .map(|u| (u.id.as_str(), u.username.as_str()))
        .collect();
    let media: HashMap<&str, &ApiMedia> = response
        .includes
        .media
        .iter()
        .map(|m| (m.media_key.as_str(), m))
        .collect();

    let mut records = Vec::with_capacity(response.data.len());
    for tweet in &response.data {
        let created_at = tweet.created_at.ok_or_else(|| {
            FeedError::Malformed(format!("bookmark {} has no created_at", tweet.id))
        })?;

        let author = tweet
            .author_id
            .as_deref()
            .map(|id| users.get(id).copied().filter(|u| !u.is_empty()).unwrap_or(id))
            .unwrap_or("unknown");

        let media_refs = tweet
            .attachments
            .as_ref()
            .map(|a| a.media_keys.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|key| match media.get(key.as_str()) {
                Some(item) => to_media_ref(item),
                None => {
                    tracing::debug!("Bookmark {} references unknown media {}", tweet.id, key);
                    Some(MediaRef::from_key(key.clone(), MediaKind::Image, None))
                }
            })
            .collect();

        records.push(
            BookmarkRecord::new(tweet.id.clone(), author, created_at, tweet.text.clone())
                .with_media(media_refs),
        );
    }

    Ok(FeedPage::new(records, response.meta.next_token))
}

fn to_media_ref(item: &ApiMedia) -> Option<MediaRef> {
    let Some(kind) = MediaKind::parse(&item.kind) else {
        tracing::debug!("Skipping media {} of unknown type {}", item.media_key, item.kind);
        return None;
    };

    let url = match kind {
        MediaKind::Image => item.url.clone().or_else(|| item.preview_image_url.clone()),
        MediaKind::Video | MediaKind::AnimatedImage => item
            .variants
            .iter()
            .filter(|v| v.content_type == "video/mp4")
            .max_by_key(|v| v.bit_rate.unwrap_or(0))
            .map(|v| v.url.clone())
            .or_else(|| item.preview_image_url.clone())
            .or_else(|| item.url.clone()),
    };

    Some(MediaRef::from_key(item.media_key.clone(), kind, url))
}
