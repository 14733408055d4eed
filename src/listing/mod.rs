//! Directory listings served by dufs-style file servers.
//!
//! A dufs server answers `GET <directory>/?json` with a JSON document that
//! describes one directory:
//!
//! ```json
//! {"href": "/music/", "paths": [{"name": "a.mp3", "path_type": "File"}]}
//! ```
//!
//! This module decodes that document ([`DirectoryListing`]) and fetches it
//! over HTTP ([`ListingClient`]).

mod client;
mod error;

use serde::Deserialize;

pub use client::{
    LISTING_CONNECT_TIMEOUT_SECS, LISTING_QUERY, LISTING_READ_TIMEOUT_SECS, ListingClient,
    listing_url,
};
pub use error::ListingError;

/// Decoded listing for a single remote directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DirectoryListing {
    /// Server-declared path of this directory, percent-escaped.
    #[serde(default = "default_href")]
    pub href: String,
    /// Entries in server order.
    #[serde(default, rename = "paths")]
    pub entries: Vec<PathEntry>,
}

fn default_href() -> String {
    "/".to_string()
}

impl DirectoryListing {
    /// Decodes a listing from a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ListingError::Decode`] when the body is not a listing document.
    pub fn from_json(url: &str, body: &[u8]) -> Result<Self, ListingError> {
        serde_json::from_slice(body).map_err(|source| ListingError::decode(url, source))
    }
}

/// One entry of a [`DirectoryListing`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PathEntry {
    /// Raw (unescaped) entry name.
    pub name: String,
    /// Entry kind as reported by the server.
    pub path_type: PathType,
}

impl PathEntry {
    /// Returns true when the entry should be traversed as a directory.
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.path_type == PathType::Dir
    }
}

/// Entry kind reported by the server.
///
/// Only `Dir` is traversed. Every other kind (`File`, `SymlinkFile`,
/// `SymlinkDir`, or anything newer) is treated as a downloadable file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum PathType {
    Dir,
    File,
    Other(String),
}

impl From<String> for PathType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Dir" => Self::Dir,
            "File" => Self::File,
            _ => Self::Other(value),
        }
    }
}
