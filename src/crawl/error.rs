//! Error types for the crawler.

use thiserror::Error;

use crate::listing::ListingError;

/// Errors produced while starting or running a crawl.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The root URL was blank after trimming.
    #[error("root URL is empty")]
    EmptyUrl,

    /// The root URL is not an absolute http(s) URL.
    #[error("invalid root URL: {url}")]
    InvalidRootUrl {
        /// The rejected input, trimmed.
        url: String,
    },

    /// The root listing could not be fetched or decoded. Fatal.
    #[error("failed to fetch root listing: {source}")]
    RootFetch {
        /// The underlying fetch error.
        #[source]
        source: ListingError,
    },

    /// A non-root listing could not be fetched or decoded. The subtree is skipped.
    #[error("skipped directory {url}: {source}")]
    DirectoryFetch {
        /// The directory URL.
        url: String,
        /// The underlying fetch error.
        #[source]
        source: ListingError,
    },
}

impl CrawlError {
    /// Creates an invalid root URL error.
    pub fn invalid_root_url(url: impl Into<String>) -> Self {
        Self::InvalidRootUrl { url: url.into() }
    }

    /// Wraps a root listing failure.
    #[must_use]
    pub fn root_fetch(source: ListingError) -> Self {
        Self::RootFetch { source }
    }

    /// Wraps a non-root listing failure.
    pub fn directory_fetch(url: impl Into<String>, source: ListingError) -> Self {
        Self::DirectoryFetch {
            url: url.into(),
            source,
        }
    }
}
