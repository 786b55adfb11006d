//! Output module for rendering archive documents and run reports
//!
//! This module handles:
//! - Rendering bookmark records as markdown documents
//! - Summarizing a sync run for the terminal

mod markdown;
pub mod summary;

pub use markdown::{format_text, render_bookmark, MediaLink};
pub use summary::{format_summary, print_summary, RunStatus, RunSummary};
