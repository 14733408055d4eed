//! Breadth-first crawler for dufs directory trees.
//!
//! A [`Crawler`] walks a remote tree starting at a root URL and flattens it
//! into a list of [`DiscoveredFile`]s whose paths are relative to that root.
//!
//! # Behavior
//!
//! - Directories are fetched one at a time in FIFO order.
//! - A failed root listing ends the crawl with [`CrawlOutcome::Failure`].
//! - A failed non-root listing drops only that subtree.
//! - Cancellation is cooperative: the worker polls a [`CancelFlag`] before
//!   each directory and before each entry, and a cancelled crawl produces no
//!   outcome at all.
//!
//! # Example
//!
//! ```no_run
//! use dufs_crawler::crawl::{CrawlOutcome, Crawler};
//! use dufs_crawler::listing::ListingClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let crawler = Crawler::new(ListingClient::new()?, "http://127.0.0.1:5000/music")?;
//! if let Some(CrawlOutcome::Success(listing)) = crawler.run().await {
//!     for file in &listing.files {
//!         println!("{}", file.relative_path);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod error;
pub mod paths;
pub mod queue;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::listing::{DirectoryListing, ListingClient};

pub use error::CrawlError;
pub use paths::{normalize_root_url, relative_path, root_folder_name};
pub use queue::{TraversalItem, TraversalQueue};

/// A file found during the crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Raw file name as listed by the server.
    pub name: String,
    /// Absolute download URL.
    pub url: String,
    /// Decoded path relative to the crawl root, without a leading `/`.
    pub relative_path: String,
}

/// A directory whose listing could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDirectory {
    /// Directory URL.
    pub url: String,
    /// Human-readable reason.
    pub reason: String,
}

/// Result of a completed crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlListing {
    /// Local top-level folder name derived from the root listing.
    pub root_folder_name: String,
    /// Files in discovery order.
    pub files: Vec<DiscoveredFile>,
    /// Non-root directories whose subtrees were dropped.
    pub skipped_directories: Vec<SkippedDirectory>,
}

/// Terminal result of a crawl that was not cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// The tree was walked.
    Success(CrawlListing),
    /// The root listing failed.
    Failure {
        /// Description of the failure, suitable for display.
        message: String,
    },
}

/// Shared cancellation flag.
///
/// Clones observe the same flag. Cancelling is idempotent.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates a flag that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Live counters updated by the crawl worker.
#[derive(Debug, Default)]
pub struct CrawlProgress {
    directories_fetched: AtomicUsize,
    directories_skipped: AtomicUsize,
    files_found: AtomicUsize,
}

/// Point-in-time copy of [`CrawlProgress`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlProgressSnapshot {
    /// Listings fetched successfully.
    pub directories_fetched: usize,
    /// Listings that failed and were skipped.
    pub directories_skipped: usize,
    /// Files discovered so far.
    pub files_found: usize,
}

impl CrawlProgress {
    /// Reads the current counters.
    #[must_use]
    pub fn snapshot(&self) -> CrawlProgressSnapshot {
        CrawlProgressSnapshot {
            directories_fetched: self.directories_fetched.load(Ordering::Relaxed),
            directories_skipped: self.directories_skipped.load(Ordering::Relaxed),
            files_found: self.files_found.load(Ordering::Relaxed),
        }
    }

    fn increment_fetched(&self) {
        self.directories_fetched.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_skipped(&self) {
        self.directories_skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_files(&self) {
        self.files_found.fetch_add(1, Ordering::Relaxed);
    }
}

/// A single crawl of one root URL.
#[derive(Debug)]
pub struct Crawler {
    client: ListingClient,
    root: Url,
    cancel: CancelFlag,
    progress: Arc<CrawlProgress>,
}

impl Crawler {
    /// Prepares a crawl of `root_url`.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::EmptyUrl`] or [`CrawlError::InvalidRootUrl`]
    /// when the URL cannot be crawled.
    pub fn new(client: ListingClient, root_url: &str) -> Result<Self, CrawlError> {
        Ok(Self {
            client,
            root: normalize_root_url(root_url)?,
            cancel: CancelFlag::new(),
            progress: Arc::new(CrawlProgress::default()),
        })
    }

    /// The normalized root URL, ending with `/`.
    #[must_use]
    pub fn root_url(&self) -> &str {
        self.root.as_str()
    }

    /// A flag that cancels this crawl when set.
    #[must_use]
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Live progress counters for this crawl.
    #[must_use]
    pub fn progress(&self) -> Arc<CrawlProgress> {
        Arc::clone(&self.progress)
    }

    /// Runs the crawl on a background task.
    ///
    /// `on_finish` is called exactly once from the worker task: with the
    /// outcome, or with `None` when the crawl was cancelled or the worker
    /// panicked. Consumers that own UI state should forward it over a channel
    /// rather than act on it directly.
    pub fn spawn<F>(self, on_finish: F) -> CrawlHandle
    where
        F: FnOnce(Option<CrawlOutcome>) + Send + 'static,
    {
        let cancel = self.cancel.clone();
        let progress = Arc::clone(&self.progress);
        let root_url = self.root.to_string();
        let task = tokio::spawn(async move {
            let guard = FinishGuard::new(on_finish);
            let outcome = self.run().await;
            guard.finish(outcome);
        });
        CrawlHandle {
            cancel,
            progress,
            root_url,
            task,
        }
    }

    /// Runs the crawl to completion on the current task.
    ///
    /// Returns `None` when cancellation was observed.
    #[instrument(skip(self), fields(root = %self.root))]
    pub async fn run(&self) -> Option<CrawlOutcome> {
        info!("starting crawl");
        match self.crawl().await {
            Ok(Some(listing)) => {
                info!(
                    root_folder = %listing.root_folder_name,
                    files = listing.files.len(),
                    skipped = listing.skipped_directories.len(),
                    "crawl finished"
                );
                Some(CrawlOutcome::Success(listing))
            }
            Ok(None) => None,
            Err(_) if self.cancel.is_cancelled() => {
                warn!("crawl interrupted");
                None
            }
            Err(e) => {
                error!(error = %e, "crawl failed");
                Some(CrawlOutcome::Failure {
                    message: e.to_string(),
                })
            }
        }
    }

    async fn crawl(&self) -> Result<Option<CrawlListing>, CrawlError> {
        let root_prefix = self.root.as_str();

        let root_listing = self
            .client
            .fetch(root_prefix)
            .await
            .map_err(CrawlError::root_fetch)?;
        let root_folder_name = root_folder_name(&self.root, &root_listing.href);
        info!(root_folder = %root_folder_name, "determined root folder name");

        let mut queue = TraversalQueue::seeded(self.root.clone());
        let mut prefetched = Some(root_listing);
        let mut files = Vec::new();
        let mut skipped_directories = Vec::new();

        while let Some(item) = queue.pop() {
            if self.cancel.is_cancelled() {
                warn!("crawl interrupted");
                return Ok(None);
            }

            if !queue.mark_visited(&item) {
                debug!(url = %item.as_str(), "directory already visited");
                continue;
            }
            debug!(url = %item.as_str(), pending = queue.len(), "processing directory");

            let listing = match take_prefetched(&mut prefetched, &item, root_prefix) {
                Some(listing) => listing,
                None => match self.client.fetch(item.as_str()).await {
                    Ok(listing) => listing,
                    Err(source) => {
                        let err = CrawlError::directory_fetch(item.as_str(), source);
                        warn!(error = %err, "skipping directory");
                        self.progress.increment_skipped();
                        skipped_directories.push(SkippedDirectory {
                            url: item.as_str().to_string(),
                            reason: err.to_string(),
                        });
                        continue;
                    }
                },
            };
            self.progress.increment_fetched();

            if !self.collect_entries(&item, &listing, &mut queue, &mut files) {
                warn!("crawl interrupted");
                return Ok(None);
            }
        }

        if self.cancel.is_cancelled() {
            warn!("crawl interrupted");
            return Ok(None);
        }
        debug!(directories = queue.visited_count(), "traversal complete");

        Ok(Some(CrawlListing {
            root_folder_name,
            files,
            skipped_directories,
        }))
    }

    /// Walks one listing, queueing directories and collecting files.
    ///
    /// Returns false if cancellation was observed part way through.
    fn collect_entries(
        &self,
        item: &TraversalItem,
        listing: &DirectoryListing,
        queue: &mut TraversalQueue,
        files: &mut Vec<DiscoveredFile>,
    ) -> bool {
        let root_prefix = self.root.as_str();

        for entry in &listing.entries {
            if self.cancel.is_cancelled() {
                return false;
            }

            if !paths::is_safe_entry_name(&entry.name) {
                warn!(directory = %item.as_str(), name = %entry.name, "ignoring unsafe entry name");
                continue;
            }

            let entry_url = match paths::entry_url(item.url(), &entry.name) {
                Ok(url) => url,
                Err(e) => {
                    warn!(directory = %item.as_str(), name = %entry.name, error = %e, "cannot join entry URL");
                    continue;
                }
            };
            let relative_path = relative_path(root_prefix, entry_url.as_str());

            if entry.is_directory() {
                debug!(name = %entry.name, path = %relative_path, "found directory");
                queue.push_directory(paths::as_directory_url(entry_url));
            } else {
                debug!(name = %entry.name, path = %relative_path, "found file");
                self.progress.increment_files();
                files.push(DiscoveredFile {
                    name: entry.name.clone(),
                    url: entry_url.into(),
                    relative_path,
                });
            }
        }
        true
    }
}

/// Calls the finish callback once, with `None` if dropped before
/// [`FinishGuard::finish`] (worker panic or abort).
struct FinishGuard<F>
where
    F: FnOnce(Option<CrawlOutcome>),
{
    on_finish: Option<F>,
}

impl<F> FinishGuard<F>
where
    F: FnOnce(Option<CrawlOutcome>),
{
    fn new(on_finish: F) -> Self {
        Self {
            on_finish: Some(on_finish),
        }
    }

    fn finish(mut self, outcome: Option<CrawlOutcome>) {
        if let Some(on_finish) = self.on_finish.take() {
            on_finish(outcome);
        }
    }
}

impl<F> Drop for FinishGuard<F>
where
    F: FnOnce(Option<CrawlOutcome>),
{
    fn drop(&mut self) {
        if let Some(on_finish) = self.on_finish.take() {
            warn!("crawl worker ended without an outcome");
            on_finish(None);
        }
    }
}

fn take_prefetched(
    prefetched: &mut Option<DirectoryListing>,
    item: &TraversalItem,
    root_prefix: &str,
) -> Option<DirectoryListing> {
    if item.as_str() == root_prefix {
        prefetched.take()
    } else {
        None
    }
}

/// Handle to a crawl running on a background task.
#[derive(Debug)]
pub struct CrawlHandle {
    cancel: CancelFlag,
    progress: Arc<CrawlProgress>,
    root_url: String,
    task: JoinHandle<()>,
}

impl CrawlHandle {
    /// Requests cooperative cancellation. Safe to call repeatedly or after
    /// the crawl has finished.
    pub fn stop(&self) {
        debug!(root = %self.root_url, "crawl stop requested");
        self.cancel.cancel();
    }

    /// Whether the worker task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// The normalized root URL being crawled.
    #[must_use]
    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    /// Current progress counters.
    #[must_use]
    pub fn progress(&self) -> CrawlProgressSnapshot {
        self.progress.snapshot()
    }

    /// The live counters, for polling from another task.
    #[must_use]
    pub fn progress_counters(&self) -> Arc<CrawlProgress> {
        Arc::clone(&self.progress)
    }

    /// Waits for the worker task to exit.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!(root = %self.root_url, error = %e, "crawl task ended abnormally");
        }
    }

    /// Requests cancellation and waits for the worker to exit.
    pub async fn stop_and_wait(self) {
        self.stop();
        self.join().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::listing::{PathEntry, PathType};

    #[test]
    fn test_cancel_flag_is_shared_and_idempotent() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        flag.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_crawler_new_normalizes_root() {
        let crawler = Crawler::new(ListingClient::new().unwrap(), "http://host/files").unwrap();
        assert_eq!(crawler.root_url(), "http://host/files/");
    }

    #[test]
    fn test_crawler_new_rejects_empty_url() {
        let result = Crawler::new(ListingClient::new().unwrap(), "  ");
        assert!(matches!(result, Err(CrawlError::EmptyUrl)));
    }

    #[test]
    fn test_progress_snapshot_counts() {
        let progress = CrawlProgress::default();
        progress.increment_fetched();
        progress.increment_files();
        progress.increment_files();
        progress.increment_skipped();
        assert_eq!(
            progress.snapshot(),
            CrawlProgressSnapshot {
                directories_fetched: 1,
                directories_skipped: 1,
                files_found: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start_yields_nothing() {
        // Nothing listens on port 9 in the test environment; the root fetch
        // fails, but a cancelled crawl must still report nothing.
        let crawler = Crawler::new(ListingClient::new().unwrap(), "http://127.0.0.1:9/").unwrap();
        crawler.cancel_flag().cancel();
        assert!(crawler.run().await.is_none());
    }

    fn listing_of(names: &[(&str, PathType)]) -> DirectoryListing {
        DirectoryListing {
            href: "/files/".to_string(),
            entries: names
                .iter()
                .map(|(name, path_type)| PathEntry {
                    name: (*name).to_string(),
                    path_type: path_type.clone(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_collect_entries_stops_mid_directory_when_cancelled() {
        let crawler = Crawler::new(ListingClient::new().unwrap(), "http://host/files/").unwrap();
        let item = TraversalItem::directory(Url::parse("http://host/files/").unwrap());
        let listing = listing_of(&[
            ("a.txt", PathType::File),
            ("sub", PathType::Dir),
            ("b.txt", PathType::File),
        ]);
        let mut queue = TraversalQueue::new();
        let mut files = Vec::new();

        crawler.cancel_flag().cancel();
        let completed = crawler.collect_entries(&item, &listing, &mut queue, &mut files);

        assert!(!completed);
        assert!(files.is_empty());
        assert!(queue.is_empty());
        assert_eq!(crawler.progress().snapshot().files_found, 0);
    }

    #[test]
    fn test_collect_entries_queues_directories_and_collects_files() {
        let crawler = Crawler::new(ListingClient::new().unwrap(), "http://host/files/").unwrap();
        let item = TraversalItem::directory(Url::parse("http://host/files/").unwrap());
        let listing = listing_of(&[
            ("a.txt", PathType::File),
            ("sub", PathType::Dir),
            ("..", PathType::Dir),
        ]);
        let mut queue = TraversalQueue::new();
        let mut files = Vec::new();

        assert!(crawler.collect_entries(&item, &listing, &mut queue, &mut files));

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "a.txt");
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop().unwrap().as_str(), "http://host/files/sub/");
    }

    #[test]
    fn test_finish_guard_reports_none_when_dropped() {
        let delivered = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&delivered);
        let guard = FinishGuard::new(move |outcome: Option<CrawlOutcome>| {
            sink.lock().unwrap().push(outcome);
        });
        drop(guard);
        assert_eq!(*delivered.lock().unwrap(), vec![None]);
    }

    #[test]
    fn test_finish_guard_delivers_outcome_once() {
        let delivered = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&delivered);
        let guard = FinishGuard::new(move |outcome: Option<CrawlOutcome>| {
            sink.lock().unwrap().push(outcome);
        });
        let outcome = CrawlOutcome::Failure {
            message: "boom".to_string(),
        };
        guard.finish(Some(outcome.clone()));
        assert_eq!(*delivered.lock().unwrap(), vec![Some(outcome)]);
    }

    #[tokio::test]
    async fn test_spawn_reports_none_when_worker_panics() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let task = tokio::spawn(async move {
            let _guard = FinishGuard::new(move |outcome: Option<CrawlOutcome>| {
                let _ = tx.send(outcome);
            });
            panic!("worker failure");
        });
        assert!(task.await.is_err());
        assert_eq!(rx.await.unwrap(), None);
    }

    #[test]
    fn test_take_prefetched_only_for_root() {
        let root = Url::parse("http://host/").unwrap();
        let mut prefetched = Some(DirectoryListing::default());
        let other = TraversalItem::directory(Url::parse("http://host/a/").unwrap());
        assert!(take_prefetched(&mut prefetched, &other, root.as_str()).is_none());
        let root_item = TraversalItem::directory(root.clone());
        assert!(take_prefetched(&mut prefetched, &root_item, root.as_str()).is_some());
        assert!(take_prefetched(&mut prefetched, &root_item, root.as_str()).is_none());
    }
}
