//! Turning a file selection into downloads.
//!
//! [`submit_selection`] maps checked files to [`DownloadTask`]s under a
//! local base folder and hands them to a [`TaskSubmitter`].
//! [`DownloadEngine`] is the bundled submitter: it streams each task to disk
//! with bounded concurrency.
//!
//! # Example
//!
//! ```no_run
//! use dufs_crawler::download::{DownloadEngine, FileDownloader, submit_selection};
//! use dufs_crawler::selection::FileSelection;
//! use std::path::Path;
//!
//! # async fn example(selection: FileSelection) -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::new(FileDownloader::new()?, 4)?;
//! submit_selection(&selection, Path::new("./downloads"), &engine, true)?;
//! let stats = engine.finish().await;
//! println!("Completed: {}, Failed: {}", stats.completed(), stats.failed());
//! # Ok(())
//! # }
//! ```

mod client;
mod engine;
mod error;
mod history;
mod plan;

pub use client::{
    DOWNLOAD_CONNECT_TIMEOUT_SECS, DOWNLOAD_READ_TIMEOUT_SECS, DownloadedFile, FileDownloader,
};
pub use engine::{DEFAULT_CONCURRENCY, DownloadEngine, DownloadStats, EngineError};
pub use error::DownloadError;
pub use history::{HistoryLog, HistoryRecord};
pub use plan::{
    DownloadTask, TaskSubmitter, ensure_directory, local_directory, plan_tasks, push_relative,
    submit_selection,
};
