//! HTTP client wrapper for streaming files to disk.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::DownloadError;
use super::plan::DownloadTask;
use crate::http::{ClientBuildError, HttpTimeouts, USER_AGENT, build_client};

/// Default connect timeout for file downloads.
pub const DOWNLOAD_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default whole-request timeout for file downloads (large files).
pub const DOWNLOAD_READ_TIMEOUT_SECS: u64 = 300;

/// Streams download tasks to their target files.
///
/// Designed to be created once and cloned into worker tasks so that all
/// downloads share one connection pool.
#[derive(Debug, Clone)]
pub struct FileDownloader {
    client: Client,
}

/// A finished download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    /// Where the file was written.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes: u64,
}

impl FileDownloader {
    /// Creates a downloader with the default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ClientBuildError`] when the HTTP client cannot be built.
    pub fn new() -> Result<Self, ClientBuildError> {
        Self::with_timeouts(HttpTimeouts {
            connect_secs: DOWNLOAD_CONNECT_TIMEOUT_SECS,
            read_secs: DOWNLOAD_READ_TIMEOUT_SECS,
        })
    }

    /// Creates a downloader with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ClientBuildError`] when the HTTP client cannot be built.
    pub fn with_timeouts(timeouts: HttpTimeouts) -> Result<Self, ClientBuildError> {
        Ok(Self {
            client: build_client(timeouts)?,
        })
    }

    /// Downloads `task.url` into `task.target_dir/task.file_name`.
    ///
    /// An existing file of the same name is overwritten. A partially
    /// written file is removed when the transfer fails.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] if the URL is invalid, the request fails,
    /// the server answers with a non-success status, or writing fails.
    #[instrument(skip(self, task), fields(url = %task.url))]
    pub async fn download(&self, task: &DownloadTask) -> Result<DownloadedFile, DownloadError> {
        debug!("starting download");
        Url::parse(&task.url).map_err(|_| DownloadError::invalid_url(&task.url))?;

        let response = self
            .client
            .get(&task.url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| DownloadError::network(&task.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(&task.url, status.as_u16()));
        }

        let file_path = task.target_dir.join(&task.file_name);
        let mut file = File::create(&file_path)
            .await
            .map_err(|e| DownloadError::io(&file_path, e))?;

        let stream_result = stream_to_file(&mut file, response, &task.url, &file_path).await;
        if stream_result.is_err() {
            debug!(path = %file_path.display(), "cleaning up partial file after error");
            let _ = tokio::fs::remove_file(&file_path).await;
        }
        let bytes = stream_result?;

        info!(path = %file_path.display(), bytes, "download complete");
        Ok(DownloadedFile {
            path: file_path,
            bytes,
        })
    }
}

/// Streams the response body to `file`, returning bytes written.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_download_rejects_invalid_url() {
        let downloader = FileDownloader::new().unwrap();
        let task = DownloadTask {
            url: "not a url".to_string(),
            file_name: "a.bin".to_string(),
            target_dir: PathBuf::from("."),
            suppress_history: true,
        };
        let result = downloader.download(&task).await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }
}
