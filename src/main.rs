//! CLI entry point for the dufs crawler.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::Parser;
use dufs_crawler::crawl::{CrawlListing, CrawlProgressSnapshot};
use dufs_crawler::download::{DownloadEngine, FileDownloader, HistoryLog, submit_selection};
use dufs_crawler::http::HttpTimeouts;
use dufs_crawler::listing::ListingClient;
use dufs_crawler::selection::FileSelection;
use dufs_crawler::session::{CrawlObserver, CrawlSession};
use tracing::{debug, info, warn};

mod cli;
mod config;
mod progress;

use cli::Args;
use config::Settings;

/// Exit status after Ctrl-C, matching the shell convention for SIGINT.
const INTERRUPTED_EXIT_CODE: u8 = 130;

/// Collects the single crawl result delivered by the session.
#[derive(Debug, Default)]
struct CrawlReport {
    listing: Option<CrawlListing>,
    error: Option<String>,
}

impl CrawlObserver for CrawlReport {
    fn on_crawl_complete(&mut self, listing: CrawlListing) {
        self.listing = Some(listing);
    }

    fn on_crawl_error(&mut self, message: &str) {
        self.error = Some(message.to_string());
    }
}

enum CrawlWait {
    Dispatched,
    Interrupted,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    init_tracing(args.default_log_level(), args.no_color);
    debug!(?args, "CLI arguments parsed");

    let loaded = config::load_default_config()?;
    if let Some(path) = loaded.config.as_ref().and(loaded.path.as_ref()) {
        debug!(path = %path.display(), "loaded config file");
    }
    let settings = Settings::from_loaded(&loaded);

    let client = ListingClient::with_timeouts(HttpTimeouts {
        connect_secs: settings.connect_timeout_secs,
        read_secs: settings.read_timeout_secs,
    })?;
    let mut session = CrawlSession::new(client);
    session.start(&args.url).await?;

    let use_spinner = progress::spinner_enabled(args.quiet);
    let crawl_spinner = match session.progress_counters() {
        Some(counters) => progress::spawn_spinner(use_spinner, move || {
            crawl_message(counters.snapshot())
        }),
        None => progress::spawn_spinner(false, String::new),
    };

    let mut report = CrawlReport::default();
    let waited = tokio::select! {
        _ = session.dispatch(&mut report) => CrawlWait::Dispatched,
        _ = tokio::signal::ctrl_c() => CrawlWait::Interrupted,
    };
    crawl_spinner.finish().await;

    if matches!(waited, CrawlWait::Interrupted) {
        warn!("interrupt received, stopping crawl");
        session.close().await;
        return Ok(ExitCode::from(INTERRUPTED_EXIT_CODE));
    }

    if let Some(message) = report.error {
        bail!("Crawl failed: {message}");
    }
    let Some(listing) = report.listing else {
        bail!("Crawl ended without a result");
    };

    for skipped in &listing.skipped_directories {
        warn!(url = %skipped.url, reason = %skipped.reason, "directory skipped");
    }

    let mut selection = FileSelection::new(listing);
    let dropped = selection.retain_prefixes(&args.include);
    let excluded: usize = args
        .exclude
        .iter()
        .map(|prefix| selection.exclude_prefix(prefix))
        .sum();
    debug!(dropped, excluded, "applied selection filters");

    if args.list {
        print!("{}", selection.render_tree());
        return Ok(ExitCode::SUCCESS);
    }

    if selection.checked_count() == 0 {
        info!(found = selection.len(), "Nothing to download");
        return Ok(ExitCode::SUCCESS);
    }

    let base = args
        .output
        .clone()
        .or_else(|| settings.download_folder.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let concurrency = args
        .concurrency
        .map_or(settings.concurrency, usize::from);

    let mut engine = DownloadEngine::new(FileDownloader::new()?, concurrency)?;
    let suppress_history = match settings.history_file.clone() {
        Some(history_file) => {
            debug!(path = %history_file.display(), "recording download history");
            engine = engine.with_history(HistoryLog::new(history_file));
            false
        }
        None => true,
    };

    let submitted = submit_selection(&selection, &base, &engine, suppress_history)?;
    info!(
        submitted,
        root = %selection.root_folder_name(),
        base = %base.display(),
        "Downloads queued"
    );

    let live = engine.stats();
    let download_spinner = progress::spawn_spinner(use_spinner, move || {
        format!("[{}/{}] Downloading...", live.total(), submitted)
    });
    let stats = engine.finish().await;
    download_spinner.finish().await;

    if !args.quiet {
        println!(
            "Downloaded {} of {} files ({} bytes) into {}",
            stats.completed(),
            submitted,
            stats.bytes(),
            base.join(selection.root_folder_name()).display()
        );
    }

    if stats.failed() > 0 {
        warn!(failed = stats.failed(), "Some downloads failed");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn crawl_message(snapshot: CrawlProgressSnapshot) -> String {
    format!(
        "Crawling... {} directories, {} files",
        snapshot.directories_fetched, snapshot.files_found
    )
}

fn init_tracing(default_level: &str, no_color_flag: bool) {
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let no_color =
        no_color_flag || progress::no_color_env_requested() || progress::is_dumb_terminal();
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_env_filter(filter)
        .try_init();
}
