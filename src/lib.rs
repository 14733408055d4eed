//! Crawler and bulk downloader for dufs file servers.
//!
//! dufs-style servers publish every directory as JSON when `?json` is
//! appended to its URL. This library walks such a tree and turns it into a
//! flat, checkable file list that can be downloaded into a local folder.
//!
//! # Architecture
//!
//! - [`listing`] - JSON listing model and HTTP fetch
//! - [`crawl`] - Cancellable breadth-first crawler
//! - [`session`] - Single-active-crawl owner that delivers results to a consumer
//! - [`selection`] - Checkable file list built from a crawl
//! - [`download`] - Mapping checked files to download tasks, and the engine that runs them
//! - [`http`] - Shared HTTP client construction

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod crawl;
pub mod download;
pub mod http;
pub mod listing;
pub mod selection;
pub mod session;

// Re-export commonly used types
pub use crawl::{CrawlError, CrawlListing, CrawlOutcome, Crawler, DiscoveredFile};
pub use download::{DownloadEngine, DownloadError, DownloadTask, TaskSubmitter};
pub use listing::{DirectoryListing, ListingClient, ListingError};
pub use selection::FileSelection;
pub use session::{CrawlObserver, CrawlSession};
