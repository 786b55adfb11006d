use crate::config::types::{Config, FeedConfig, MediaConfig, OutputConfig, RetryConfig};
use crate::record::MediaKind;
use crate::ConfigError;
use url::Url;

/// Largest page the bookmarks endpoint accepts
pub const MAX_PAGE_SIZE: u32 = 100;

/// Upper bound on concurrent media downloads
pub const MAX_WORKERS: usize = 32;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_feed_config(&config.feed)?;
    validate_output_config(&config.output)?;
    validate_media_config(&config.media)?;
    validate_retry_config(&config.retry)?;
    Ok(())
}

/// Validates feed configuration
fn validate_feed_config(config: &FeedConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.api_base)
        .map_err(|e| ConfigError::InvalidUrl(format!("api-base '{}': {}", config.api_base, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "api-base must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if let Some(user_id) = &config.user_id {
        if user_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "user-id cannot be empty when set".to_string(),
            ));
        }
    }

    if config.token_env.trim().is_empty() {
        return Err(ConfigError::Validation(
            "token-env cannot be empty".to_string(),
        ));
    }

    validate_page_size(config.page_size)?;

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates a page size against the endpoint's bounds
pub fn validate_page_size(page_size: u32) -> Result<(), ConfigError> {
    if page_size < 1 || page_size > MAX_PAGE_SIZE {
        return Err(ConfigError::Validation(format!(
            "page-size must be between 1 and {}, got {}",
            MAX_PAGE_SIZE, page_size
        )));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.output_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output-dir cannot be empty".to_string(),
        ));
    }

    if config.state_path.file_name().is_none() {
        return Err(ConfigError::Validation(format!(
            "state-path must name a file, got '{}'",
            config.state_path.display()
        )));
    }

    Ok(())
}

/// Validates media configuration
fn validate_media_config(config: &MediaConfig) -> Result<(), ConfigError> {
    parse_media_types(&config.types)?;

    if config.max_bytes == 0 {
        return Err(ConfigError::Validation(
            "max-bytes must be >= 1".to_string(),
        ));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    Ok(())
}

/// Validates retry configuration
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.page_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "page-retries must be <= 10, got {}",
            config.page_retries
        )));
    }

    if config.media_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "media-retries must be <= 10, got {}",
            config.media_retries
        )));
    }

    Ok(())
}

/// Parses media type names into kinds
pub fn parse_media_types<S: AsRef<str>>(types: &[S]) -> Result<Vec<MediaKind>, ConfigError> {
    types
        .iter()
        .map(|t| t.as_ref())
        .filter(|t| !t.trim().is_empty())
        .map(|t| t.parse::<MediaKind>().map_err(ConfigError::Validation))
        .collect()
}
