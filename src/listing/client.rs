//! HTTP client for dufs JSON listings.

use reqwest::Client;
use tracing::{debug, instrument};

use super::{DirectoryListing, ListingError};
use crate::http::{ClientBuildError, HttpTimeouts, USER_AGENT, build_client};

/// Query marker that switches a dufs directory page to JSON.
pub const LISTING_QUERY: &str = "json";

/// Default connect timeout for listing requests.
pub const LISTING_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default whole-request timeout for listing requests.
pub const LISTING_READ_TIMEOUT_SECS: u64 = 30;

/// Builds the JSON listing URL for a directory URL.
///
/// The directory URL is expected to end with `/`.
#[must_use]
pub fn listing_url(directory_url: &str) -> String {
    format!("{directory_url}?{LISTING_QUERY}")
}

/// Fetches directory listings from a dufs server.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct ListingClient {
    client: Client,
}

impl ListingClient {
    /// Creates a client with the default listing timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ClientBuildError`] when the HTTP client cannot be built.
    pub fn new() -> Result<Self, ClientBuildError> {
        Self::with_timeouts(HttpTimeouts {
            connect_secs: LISTING_CONNECT_TIMEOUT_SECS,
            read_secs: LISTING_READ_TIMEOUT_SECS,
        })
    }

    /// Creates a client with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ClientBuildError`] when the HTTP client cannot be built.
    pub fn with_timeouts(timeouts: HttpTimeouts) -> Result<Self, ClientBuildError> {
        Ok(Self {
            client: build_client(timeouts)?,
        })
    }

    /// Fetches and decodes the listing of `directory_url`.
    ///
    /// Makes a single attempt. Any non-success status, transport error or
    /// malformed body is returned as an error.
    ///
    /// # Errors
    ///
    /// Returns [`ListingError`] describing the failed fetch.
    #[instrument(skip(self), fields(url = %directory_url))]
    pub async fn fetch(&self, directory_url: &str) -> Result<DirectoryListing, ListingError> {
        let url = listing_url(directory_url);
        debug!("fetching listing");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| ListingError::network(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ListingError::http_status(&url, status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ListingError::network(&url, e))?;
        let listing = DirectoryListing::from_json(&url, &body)?;
        debug!(entries = listing.entries.len(), "listing fetched");
        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_url_appends_json_marker() {
        assert_eq!(
            listing_url("http://host/files/"),
            "http://host/files/?json"
        );
    }

    #[test]
    fn test_listing_client_builds_with_defaults() {
        assert!(ListingClient::new().is_ok());
    }
}
