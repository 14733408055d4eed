//! Mapping checked files onto local download tasks.
//!
//! Each checked file lands in
//! `<base folder>/<root folder name>/<directory part of its relative path>`.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

use super::DownloadError;
use crate::crawl::DiscoveredFile;
use crate::crawl::paths::is_safe_entry_name;
use crate::selection::FileSelection;

/// One request handed to the download engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// Absolute download URL.
    pub url: String,
    /// File name to save under.
    pub file_name: String,
    /// Local directory to save into.
    pub target_dir: PathBuf,
    /// When true the engine does not record this download in its history.
    pub suppress_history: bool,
}

/// Accepts download tasks. Submission is fire-and-forget: queueing,
/// progress and failures are the implementor's concern.
pub trait TaskSubmitter {
    /// Enqueues one task.
    fn submit(&self, task: DownloadTask);
}

/// Appends the components of a listing-derived relative path to `base`.
///
/// Only normal components are accepted; `.` is ignored.
///
/// # Errors
///
/// Returns [`DownloadError::UnsafePath`] for `..`, absolute paths and
/// drive prefixes.
pub fn push_relative(base: &Path, relative: &str) -> Result<PathBuf, DownloadError> {
    let mut out = base.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(DownloadError::unsafe_path(relative));
            }
        }
    }
    Ok(out)
}

/// Computes the local directory for a file.
///
/// # Errors
///
/// Returns [`DownloadError::UnsafePath`] when the root folder name or the
/// relative path would escape `base`.
pub fn local_directory(
    base: &Path,
    root_folder_name: &str,
    relative_path: &str,
) -> Result<PathBuf, DownloadError> {
    let root = push_relative(base, root_folder_name)?;
    let parent = relative_path
        .rsplit_once('/')
        .map_or("", |(dir, _)| dir);
    push_relative(&root, parent)
}

/// Builds download tasks for `files`, skipping any whose path is unsafe.
///
/// Every task carries `suppress_history`.
pub fn plan_tasks<'a, I>(
    base: &Path,
    root_folder_name: &str,
    files: I,
    suppress_history: bool,
) -> Vec<DownloadTask>
where
    I: IntoIterator<Item = &'a DiscoveredFile>,
{
    files
        .into_iter()
        .filter_map(|file| {
            if !is_safe_entry_name(&file.name) {
                warn!(name = %file.name, "skipping file with unsafe name");
                return None;
            }
            match local_directory(base, root_folder_name, &file.relative_path) {
                Ok(target_dir) => Some(DownloadTask {
                    url: file.url.clone(),
                    file_name: file.name.clone(),
                    target_dir,
                    suppress_history,
                }),
                Err(e) => {
                    warn!(error = %e, "skipping file");
                    None
                }
            }
        })
        .collect()
}

/// Creates `path` and its parents unless it already exists.
///
/// # Errors
///
/// Returns [`DownloadError::Io`] when the directory cannot be created.
pub fn ensure_directory(path: &Path) -> Result<(), DownloadError> {
    if path.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(path).map_err(|e| DownloadError::io(path, e))?;
    debug!(dir = %path.display(), "created directory");
    Ok(())
}

/// Submits every checked file of `selection` to `submitter`.
///
/// Directories are created before each submission. Interactive bulk
/// downloads pass `suppress_history = true` so they stay out of the history
/// log. Returns the number of submitted tasks.
///
/// # Errors
///
/// Returns [`DownloadError`] when the root folder name is unsafe or a
/// directory cannot be created. Tasks submitted before the error stay
/// submitted.
pub fn submit_selection<S>(
    selection: &FileSelection,
    base: &Path,
    submitter: &S,
    suppress_history: bool,
) -> Result<usize, DownloadError>
where
    S: TaskSubmitter + ?Sized,
{
    let root_dir = push_relative(base, selection.root_folder_name())?;
    if !root_dir.is_dir() {
        ensure_directory(&root_dir)?;
        info!(dir = %root_dir.display(), "created root download directory");
    }

    let tasks = plan_tasks(
        base,
        selection.root_folder_name(),
        selection.checked_files(),
        suppress_history,
    );
    let mut submitted = 0;
    for task in tasks {
        ensure_directory(&task.target_dir)?;
        info!(
            url = %task.url,
            file_name = %task.file_name,
            dir = %task.target_dir.display(),
            "adding download task"
        );
        submitter.submit(task);
        submitted += 1;
    }
    Ok(submitted)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use tempfile::TempDir;

    use super::*;
    use crate::crawl::CrawlListing;

    #[derive(Default)]
    struct RecordingSubmitter {
        tasks: Mutex<Vec<DownloadTask>>,
    }

    impl TaskSubmitter for RecordingSubmitter {
        fn submit(&self, task: DownloadTask) {
            self.tasks.lock().unwrap().push(task);
        }
    }

    fn file(name: &str, relative_path: &str) -> DiscoveredFile {
        DiscoveredFile {
            name: name.to_string(),
            url: format!("http://host/files/{relative_path}"),
            relative_path: relative_path.to_string(),
        }
    }

    #[test]
    fn test_local_directory_top_level_file() {
        let dir = local_directory(Path::new("/dl"), "files", "a.txt").unwrap();
        assert_eq!(dir, Path::new("/dl/files"));
    }

    #[test]
    fn test_local_directory_nested_file() {
        let dir = local_directory(Path::new("/dl"), "my stuff", "sub/deep/a.txt").unwrap();
        assert_eq!(dir, Path::new("/dl/my stuff/sub/deep"));
    }

    #[test]
    fn test_local_directory_rejects_parent_components() {
        let result = local_directory(Path::new("/dl"), "files", "../../etc/passwd");
        assert!(matches!(result, Err(DownloadError::UnsafePath { .. })));
        let result = local_directory(Path::new("/dl"), "..", "a.txt");
        assert!(matches!(result, Err(DownloadError::UnsafePath { .. })));
    }

    #[test]
    fn test_plan_tasks_maps_fields_and_suppresses_history() {
        let files = vec![file("a.txt", "a.txt"), file("b.txt", "sub/b.txt")];
        let tasks = plan_tasks(Path::new("/dl"), "files", &files, true);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].url, "http://host/files/sub/b.txt");
        assert_eq!(tasks[1].file_name, "b.txt");
        assert_eq!(tasks[1].target_dir, Path::new("/dl/files/sub"));
        assert!(tasks.iter().all(|t| t.suppress_history));
    }

    #[test]
    fn test_plan_tasks_can_keep_history() {
        let files = vec![file("a.txt", "a.txt")];
        let tasks = plan_tasks(Path::new("/dl"), "files", &files, false);
        assert!(!tasks[0].suppress_history);
    }

    #[test]
    fn test_plan_tasks_skips_unsafe_entries() {
        let files = vec![file("..", "x/.."), file("ok.txt", "../ok.txt"), file("c.txt", "c.txt")];
        let tasks = plan_tasks(Path::new("/dl"), "files", &files, true);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].file_name, "c.txt");
    }

    #[test]
    fn test_ensure_directory_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("a").join("b");
        ensure_directory(&dir).unwrap();
        ensure_directory(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_submit_selection_creates_directories_and_submits_checked() {
        let temp = TempDir::new().unwrap();
        let mut selection = FileSelection::new(CrawlListing {
            root_folder_name: "files".to_string(),
            files: vec![
                file("a.txt", "a.txt"),
                file("b.txt", "sub/b.txt"),
                file("c.txt", "skip/c.txt"),
            ],
            skipped_directories: Vec::new(),
        });
        selection.exclude_prefix("skip");

        let submitter = RecordingSubmitter::default();
        let count = submit_selection(&selection, temp.path(), &submitter, true).unwrap();

        assert_eq!(count, 2);
        assert!(temp.path().join("files").is_dir());
        assert!(temp.path().join("files").join("sub").is_dir());
        assert!(!temp.path().join("files").join("skip").exists());
        let tasks = submitter.tasks.lock().unwrap();
        assert_eq!(tasks[0].file_name, "a.txt");
        assert_eq!(tasks[1].target_dir, temp.path().join("files").join("sub"));
    }

    #[test]
    fn test_submit_selection_tolerates_existing_directories() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("files").join("sub")).unwrap();
        let selection = FileSelection::new(CrawlListing {
            root_folder_name: "files".to_string(),
            files: vec![file("b.txt", "sub/b.txt")],
            skipped_directories: Vec::new(),
        });
        let submitter = RecordingSubmitter::default();
        assert_eq!(submit_selection(&selection, temp.path(), &submitter, true).unwrap(), 1);
    }
}
