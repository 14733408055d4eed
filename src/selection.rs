//! Checkable file list presented to the user before downloading.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::crawl::{CrawlListing, DiscoveredFile};

/// A discovered file plus its check state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectableFile {
    /// The discovered file.
    pub file: DiscoveredFile,
    /// Whether the file will be downloaded.
    pub checked: bool,
}

/// The crawl result as a checkable list. Every file starts checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSelection {
    root_folder_name: String,
    entries: Vec<SelectableFile>,
}

impl FileSelection {
    /// Builds a selection with every file checked.
    #[must_use]
    pub fn new(listing: CrawlListing) -> Self {
        let entries = listing
            .files
            .into_iter()
            .map(|file| SelectableFile {
                file,
                checked: true,
            })
            .collect();
        Self {
            root_folder_name: listing.root_folder_name,
            entries,
        }
    }

    /// Local top-level folder name for this crawl.
    #[must_use]
    pub fn root_folder_name(&self) -> &str {
        &self.root_folder_name
    }

    /// All entries in discovery order.
    #[must_use]
    pub fn entries(&self) -> &[SelectableFile] {
        &self.entries
    }

    /// Number of files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the crawl found no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sets the check state of one entry. Returns false for an out-of-range index.
    pub fn set_checked(&mut self, index: usize, checked: bool) -> bool {
        match self.entries.get_mut(index) {
            Some(entry) => {
                entry.checked = checked;
                true
            }
            None => false,
        }
    }

    /// Unchecks every file under `prefix`. Returns how many changed.
    pub fn exclude_prefix(&mut self, prefix: &str) -> usize {
        let prefix = normalize_prefix(prefix);
        let mut changed = 0;
        for entry in &mut self.entries {
            if entry.checked && matches_prefix(&entry.file.relative_path, &prefix) {
                entry.checked = false;
                changed += 1;
            }
        }
        changed
    }

    /// Unchecks every file not under one of `prefixes`. Returns how many changed.
    ///
    /// An empty prefix list leaves the selection unchanged.
    pub fn retain_prefixes<S: AsRef<str>>(&mut self, prefixes: &[S]) -> usize {
        if prefixes.is_empty() {
            return 0;
        }
        let prefixes: Vec<String> = prefixes
            .iter()
            .map(|p| normalize_prefix(p.as_ref()))
            .collect();
        let mut changed = 0;
        for entry in &mut self.entries {
            let keep = prefixes
                .iter()
                .any(|prefix| matches_prefix(&entry.file.relative_path, prefix));
            if entry.checked && !keep {
                entry.checked = false;
                changed += 1;
            }
        }
        changed
    }

    /// Files currently checked, in discovery order.
    pub fn checked_files(&self) -> impl Iterator<Item = &DiscoveredFile> {
        self.entries
            .iter()
            .filter(|entry| entry.checked)
            .map(|entry| &entry.file)
    }

    /// Number of checked files.
    #[must_use]
    pub fn checked_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.checked).count()
    }

    /// Renders the selection as an indented tree grouped by directory.
    #[must_use]
    pub fn render_tree(&self) -> String {
        let mut by_dir: BTreeMap<&str, Vec<&SelectableFile>> = BTreeMap::new();
        for entry in &self.entries {
            let dir = entry
                .file
                .relative_path
                .rsplit_once('/')
                .map_or("", |(dir, _)| dir);
            by_dir.entry(dir).or_default().push(entry);
        }

        let mut out = format!("{}/\n", self.root_folder_name);
        for (dir, files) in by_dir {
            let depth = if dir.is_empty() {
                1
            } else {
                let _ = writeln!(out, "  {dir}/");
                2
            };
            for entry in files {
                let mark = if entry.checked { "[x]" } else { "[ ]" };
                let _ = writeln!(
                    out,
                    "{}{mark} {}",
                    "  ".repeat(depth),
                    entry.file.name
                );
            }
        }
        out
    }
}

fn normalize_prefix(prefix: &str) -> String {
    prefix.trim().trim_matches('/').to_string()
}

fn matches_prefix(relative_path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    relative_path == prefix
        || relative_path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}
