//! Bookmark Mirror main entry point
//!
//! This is the command-line interface for the bookmark archiver.

use anyhow::Context;
use bookmark_mirror::config::{load_config_or_default, parse_media_types, validate_page_size, Config};
use bookmark_mirror::output::print_summary;
use bookmark_mirror::sync::{run_sync, HttpMediaFetcher, SyncOptions};
use bookmark_mirror::{ArtifactStore, CursorStore, FileCursorStore, XFeedClient};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Bookmark Mirror: incremental local archive of X bookmarks
///
/// Walks the bookmark feed newest first, writes one markdown file per
/// bookmark with its media alongside, and remembers where it stopped so
/// the next run only fetches what is new.
#[derive(Parser, Debug)]
#[command(name = "bookmark-mirror")]
#[command(version)]
#[command(about = "Incremental local archive of X bookmarks", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Ignore the stored cursor and walk the whole feed
    #[arg(long)]
    force: bool,

    /// Rewrite bookmarks that are already archived
    #[arg(long)]
    overwrite: bool,

    /// Link media remotely instead of downloading it
    #[arg(long)]
    no_media: bool,

    /// Media types to download (photo, video, animated_gif)
    #[arg(long, value_delimiter = ',', value_name = "TYPES")]
    media_types: Option<Vec<String>>,

    /// Bookmarks requested per page (1-100)
    #[arg(long)]
    page_size: Option<u32>,

    /// Stop the run at the first bookmark that cannot be archived
    #[arg(long)]
    fail_fast: bool,

    /// Override the output directory
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Show the stored cursor and archive size, then exit
    #[arg(long, conflicts_with_all = ["force", "overwrite"])]
    status: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let mut config = load_config_or_default(cli.config.as_deref()).with_context(|| {
        match &cli.config {
            Some(path) => format!("Failed to load configuration from {}", path.display()),
            None => "Invalid default configuration".to_string(),
        }
    })?;
    if let Some(dir) = &cli.output_dir {
        config.output.output_dir = dir.clone();
    }

    if cli.status {
        handle_status(&config)
    } else {
        handle_sync(&config, &cli).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("bookmark_mirror=info,warn"),
            1 => EnvFilter::new("bookmark_mirror=debug,info"),
            2 => EnvFilter::new("bookmark_mirror=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Applies command-line overrides on top of the configuration
fn build_options(config: &Config, cli: &Cli) -> anyhow::Result<SyncOptions> {
    let mut options = SyncOptions::from_config(config)?;

    options.force_full_resync = cli.force;
    options.overwrite = cli.overwrite;
    options.skip_errors = !cli.fail_fast;

    if cli.no_media {
        options.download_media = false;
    }
    if let Some(types) = &cli.media_types {
        options.media_types = parse_media_types(types)?.into_iter().collect();
    }
    if let Some(page_size) = cli.page_size {
        validate_page_size(page_size)?;
        options.page_size = page_size;
    }

    Ok(options)
}

/// Handles the --status mode: shows cursor and archive state
fn handle_status(config: &Config) -> anyhow::Result<()> {
    let store = FileCursorStore::new(&config.output.state_path);
    let artifacts = ArtifactStore::open(
        &config.output.output_dir,
        config.output.resolved_media_dir(),
    )?;

    println!("=== Bookmark Mirror Status ===\n");
    println!("  Output directory: {}", artifacts.output_dir().display());
    println!("  Media directory:  {}", artifacts.media_dir().display());
    println!("  Archived:         {} bookmarks", artifacts.indexed_count());

    match store.load() {
        Some(cursor) => {
            println!("  Cursor:           {}", cursor.id);
            if let Some(updated_at) = cursor.updated_at {
                println!("  Last advanced:    {}", updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
            }
        }
        None => println!("  Cursor:           (none, next run walks the whole feed)"),
    }

    Ok(())
}

/// Handles the main sync operation
async fn handle_sync(config: &Config, cli: &Cli) -> anyhow::Result<()> {
    let options = build_options(config, cli)?;

    if options.force_full_resync {
        tracing::info!("Starting full resync");
    } else {
        tracing::info!("Starting incremental sync");
    }

    let feed = XFeedClient::connect(&config.feed)
        .await
        .context("Failed to connect to the bookmark feed")?;
    tracing::info!("Mirroring bookmarks of user {}", feed.user_id());

    let store = FileCursorStore::new(&config.output.state_path);
    let artifacts = ArtifactStore::open(
        &config.output.output_dir,
        config.output.resolved_media_dir(),
    )?;
    let fetcher = Arc::new(HttpMediaFetcher::with_limits(&options.media_limits)?);

    match run_sync(&feed, &store, artifacts, fetcher, &options).await {
        Ok(summary) => {
            if !cli.quiet {
                print_summary(&summary);
            }
            Ok(())
        }
        Err(failure) => {
            print_summary(&failure.summary);
            if failure.error.is_auth() {
                tracing::error!(
                    "Credentials were rejected; refresh the token in {}",
                    config.feed.token_env
                );
            }
            Err(failure.error.into())
        }
    }
}
