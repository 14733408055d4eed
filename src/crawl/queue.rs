//! FIFO worklist of pending directories plus the visited set.

use std::collections::{HashSet, VecDeque};

use url::Url;

/// A directory waiting to be fetched.
///
/// Only directories are ever queued; files are terminal results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalItem {
    url: Url,
}

impl TraversalItem {
    /// Creates an item for a directory URL ending with `/`.
    #[must_use]
    pub fn directory(url: Url) -> Self {
        Self { url }
    }

    /// The directory URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The directory URL as a string, which is also the visited-set key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

/// Breadth-first worklist owned by a single crawl.
#[derive(Debug, Default)]
pub struct TraversalQueue {
    pending: VecDeque<TraversalItem>,
    visited: HashSet<String>,
}

impl TraversalQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a queue holding only the root directory.
    #[must_use]
    pub fn seeded(root: Url) -> Self {
        let mut queue = Self::new();
        queue.push_directory(root);
        queue
    }

    /// Appends a directory to the back of the queue.
    pub fn push_directory(&mut self, url: Url) {
        self.pending.push_back(TraversalItem::directory(url));
    }

    /// Removes the oldest pending directory.
    pub fn pop(&mut self) -> Option<TraversalItem> {
        self.pending.pop_front()
    }

    /// Records `item` as visited.
    ///
    /// Returns false when it had already been visited, in which case the
    /// caller must not fetch it again.
    pub fn mark_visited(&mut self, item: &TraversalItem) -> bool {
        self.visited.insert(item.as_str().to_string())
    }

    /// Number of directories still pending.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no directories are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of distinct directories visited so far.
    #[must_use]
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}
