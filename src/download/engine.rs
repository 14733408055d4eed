//! Download engine that executes submitted tasks concurrently.
//!
//! The engine is the [`TaskSubmitter`] behind the crawl's download step:
//! each submitted task runs on its own Tokio task, gated by a semaphore so
//! that at most `concurrency` transfers are in flight.
//!
//! # Example
//!
//! ```no_run
//! use dufs_crawler::download::{DownloadEngine, DownloadTask, FileDownloader, TaskSubmitter};
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::new(FileDownloader::new()?, 4)?;
//! engine.submit(DownloadTask {
//!     url: "http://127.0.0.1:5000/a.txt".to_string(),
//!     file_name: "a.txt".to_string(),
//!     target_dir: PathBuf::from("./downloads"),
//!     suppress_history: true,
//! });
//! let stats = engine.finish().await;
//! println!("Completed: {}, Failed: {}", stats.completed(), stats.failed());
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::client::FileDownloader;
use super::history::{HistoryLog, HistoryRecord};
use super::plan::{DownloadTask, TaskSubmitter};

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 32;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Error type for download engine construction.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Counters for one engine's lifetime.
///
/// Updated atomically from concurrent download tasks.
#[derive(Debug, Default)]
pub struct DownloadStats {
    completed: AtomicUsize,
    failed: AtomicUsize,
    bytes: AtomicU64,
}

impl DownloadStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of successfully completed downloads.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Returns the number of failed downloads.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Returns the total number of finished downloads (completed + failed).
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed() + self.failed()
    }

    /// Returns the number of bytes written by completed downloads.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::SeqCst)
    }

    fn record_completed(&self, bytes: u64) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.bytes.fetch_add(bytes, Ordering::SeqCst);
    }

    fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Executes download tasks with bounded concurrency.
///
/// [`TaskSubmitter::submit`] spawns onto the current Tokio runtime and must
/// be called from within one.
#[derive(Debug)]
pub struct DownloadEngine {
    downloader: FileDownloader,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    stats: Arc<DownloadStats>,
    history: Option<Arc<HistoryLog>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl DownloadEngine {
    /// Creates an engine running at most `concurrency` downloads at once.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-32).
    pub fn new(downloader: FileDownloader, concurrency: usize) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }
        debug!(concurrency, "creating download engine");
        Ok(Self {
            downloader,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            stats: Arc::new(DownloadStats::new()),
            history: None,
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Records completed downloads in `history` unless a task suppresses it.
    #[must_use]
    pub fn with_history(mut self, history: HistoryLog) -> Self {
        self.history = Some(Arc::new(history));
        self
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Live counters.
    #[must_use]
    pub fn stats(&self) -> Arc<DownloadStats> {
        Arc::clone(&self.stats)
    }

    /// Waits for every submitted task and returns the final counters.
    pub async fn finish(&self) -> Arc<DownloadStats> {
        loop {
            let pending: Vec<JoinHandle<()>> = {
                let mut guard = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
                std::mem::take(&mut *guard)
            };
            if pending.is_empty() {
                break;
            }
            for handle in pending {
                if let Err(e) = handle.await {
                    warn!(error = %e, "download task ended abnormally");
                }
            }
        }

        info!(
            completed = self.stats.completed(),
            failed = self.stats.failed(),
            bytes = self.stats.bytes(),
            "downloads finished"
        );
        Arc::clone(&self.stats)
    }
}

impl TaskSubmitter for DownloadEngine {
    fn submit(&self, task: DownloadTask) {
        let downloader = self.downloader.clone();
        let semaphore = Arc::clone(&self.semaphore);
        let stats = Arc::clone(&self.stats);
        let history = self.history.clone();

        let handle = tokio::spawn(async move {
            // The semaphore is never closed.
            let Ok(_permit) = semaphore.acquire_owned().await else {
                warn!(url = %task.url, "download semaphore closed");
                stats.record_failed();
                return;
            };

            match downloader.download(&task).await {
                Ok(done) => {
                    stats.record_completed(done.bytes);
                    if !task.suppress_history
                        && let Some(history) = history
                    {
                        let record = HistoryRecord {
                            url: task.url.clone(),
                            path: done.path,
                            bytes: done.bytes,
                        };
                        if let Err(e) = history.append(&record).await {
                            warn!(error = %e, "failed to record download history");
                        }
                    }
                }
                Err(e) => {
                    warn!(url = %task.url, error = %e, "download failed");
                    stats.record_failed();
                }
            }
        });

        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }
}
