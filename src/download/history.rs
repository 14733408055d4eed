//! JSON-lines record of completed downloads.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::DownloadError;

/// One completed download.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HistoryRecord {
    /// Source URL.
    pub url: String,
    /// Local file path.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes: u64,
}

/// Append-only history file shared by download workers.
#[derive(Debug)]
pub struct HistoryLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl HistoryLog {
    /// Uses `path` as the history file. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// The history file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record as a JSON line.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] when the file cannot be written.
    pub async fn append(&self, record: &HistoryRecord) -> Result<(), DownloadError> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| DownloadError::io(&self.path, std::io::Error::other(e)))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| DownloadError::io(&self.path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| DownloadError::io(&self.path, e))?;
        file.flush()
            .await
            .map_err(|e| DownloadError::io(&self.path, e))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_append_writes_one_line_per_record() {
        let temp = TempDir::new().unwrap();
        let log = HistoryLog::new(temp.path().join("history.jsonl"));
        for name in ["a", "b"] {
            log.append(&HistoryRecord {
                url: format!("http://host/{name}"),
                path: temp.path().join(name),
                bytes: 3,
            })
            .await
            .unwrap();
        }

        let raw = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["url"], "http://host/a");
        assert_eq!(first["bytes"], 3);
    }
}
