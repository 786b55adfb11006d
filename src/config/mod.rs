//! Configuration module for Bookmark Mirror
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every table and key is optional; a missing file means all defaults.
//!
//! # Example
//!
//! ```no_run
//! use bookmark_mirror::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("mirror.toml")).unwrap();
//! println!("Archiving into: {}", config.output.output_dir.display());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, FeedConfig, MediaConfig, OutputConfig, RetryConfig};

// Re-export parser functions
pub use parser::{load_config, load_config_or_default, parse_config};
pub use validation::{parse_media_types, validate, validate_page_size, MAX_PAGE_SIZE};

use crate::record::MediaKind;
use crate::ConfigError;
use std::collections::HashSet;

impl Config {
    /// Media kinds selected for download; empty means every kind
    pub fn media_kinds(&self) -> Result<HashSet<MediaKind>, ConfigError> {
        Ok(parse_media_types(&self.media.types)?.into_iter().collect())
    }
}
