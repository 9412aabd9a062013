//! Upstream source download
//!
//! Fetches package tarballs into the upstream directory with checksum
//! verification and retry with exponential backoff. Data is streamed into a
//! per-package `.part` file and only renamed into place once the checksum
//! matches, so a tarball in the upstream directory is always complete.

use backoff::ExponentialBackoffBuilder;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::config::defaults;
use crate::core::package::Source;
use crate::error::DownloadError;

/// Download result containing file path and metadata
#[derive(Debug)]
pub struct DownloadResult {
    /// Path to the downloaded file
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// SHA256 checksum of the downloaded content
    pub checksum: String,
}

/// Download manager for fetching upstream tarballs
#[derive(Debug, Clone)]
pub struct DownloadManager {
    /// HTTP client
    client: reqwest::Client,
    /// Maximum attempts per file
    max_retries: u32,
    /// Initial delay for exponential backoff
    base_delay: Duration,
}

impl DownloadManager {
    /// Create a download manager with default retry settings
    pub fn new() -> Self {
        Self::with_config(
            defaults::MAX_DOWNLOAD_RETRIES,
            defaults::DOWNLOAD_RETRY_BASE_MS,
        )
    }

    /// Create a download manager with custom retry settings
    pub fn with_config(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(300))
                .connect_timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            max_retries: max_retries.max(1),
            base_delay: Duration::from_millis(base_delay_ms),
        }
    }

    /// Get max retries
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Make sure the tarball for `source` is present in `upstream_dir`
    ///
    /// An existing file with the right checksum is reused; anything else is
    /// downloaded again. `owner` is the package doing the fetch and keeps its
    /// partial file apart from other packages sharing the same tarball.
    pub async fn fetch_source(
        &self,
        source: &Source,
        upstream_dir: &Path,
        owner: &str,
    ) -> Result<PathBuf, DownloadError> {
        let filename = source.filename().ok_or_else(|| DownloadError::InvalidUrl {
            url: source.url.clone(),
        })?;
        let dest = upstream_dir.join(filename);

        if dest.exists() && verify_checksum_async(&dest, &source.sha256).await? {
            tracing::debug!("{} already present, skipping download", dest.display());
            return Ok(dest);
        }

        tracing::info!("Downloading {}", source.url);
        let result = self
            .download_verified(&source.url, &dest, &source.sha256, owner)
            .await?;
        tracing::info!("Downloaded {} ({} bytes)", dest.display(), result.size);
        Ok(result.path)
    }

    /// Download a file, verify its checksum and move it to `dest`
    ///
    /// Each `owner` streams into its own partial file, so concurrent
    /// downloads of one URL never interleave their writes.
    pub async fn download_verified(
        &self,
        url: &str,
        dest: &Path,
        expected_checksum: &str,
        owner: &str,
    ) -> Result<DownloadResult, DownloadError> {
        let partial = partial_path(dest, owner);
        let result = self.download(url, &partial).await?;

        if !result.checksum.eq_ignore_ascii_case(expected_checksum) {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(DownloadError::ChecksumMismatch {
                file: dest.display().to_string(),
                expected: expected_checksum.to_lowercase(),
                actual: result.checksum,
            });
        }

        tokio::fs::rename(&partial, dest)
            .await
            .map_err(|e| DownloadError::IoError {
                path: dest.to_path_buf(),
                error: e.to_string(),
            })?;

        Ok(DownloadResult {
            path: dest.to_path_buf(),
            ..result
        })
    }

    /// Download with retry
    pub async fn download(&self, url: &str, dest: &Path) -> Result<DownloadResult, DownloadError> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.base_delay)
            .with_max_interval(Duration::from_secs(30))
            .with_max_elapsed_time(None)
            .build();
        let attempts = AtomicU32::new(0);

        let result = backoff::future::retry(policy, || async {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            match self.download_once(url, dest).await {
                Ok(result) => Ok(result),
                Err(e) if attempt >= self.max_retries => Err(backoff::Error::permanent(e)),
                Err(e) => {
                    tracing::warn!("Download attempt {attempt} of {url} failed: {e}");
                    Err(backoff::Error::transient(e))
                }
            }
        })
        .await;

        if result.is_err() {
            let _ = tokio::fs::remove_file(dest).await;
        }
        result.map_err(|e| match e {
            DownloadError::NetworkError { .. } if self.max_retries > 1 => {
                DownloadError::MaxRetriesExceeded {
                    url: url.to_string(),
                    retries: self.max_retries,
                }
            }
            other => other,
        })
    }

    /// Single download attempt without retry
    async fn download_once(&self, url: &str, dest: &Path) -> Result<DownloadResult, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::NetworkError {
                url: url.to_string(),
                error: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(DownloadError::NetworkError {
                url: url.to_string(),
                error: format!("HTTP {}", response.status()),
            });
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::IoError {
                    path: parent.to_path_buf(),
                    error: e.to_string(),
                })?;
        }

        let mut file = File::create(dest)
            .await
            .map_err(|e| DownloadError::IoError {
                path: dest.to_path_buf(),
                error: e.to_string(),
            })?;

        let mut hasher = Sha256::new();
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| DownloadError::NetworkError {
                url: url.to_string(),
                error: e.to_string(),
            })?;

            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::IoError {
                    path: dest.to_path_buf(),
                    error: e.to_string(),
                })?;

            hasher.update(&chunk);
            downloaded += chunk.len() as u64;
        }

        file.flush().await.map_err(|e| DownloadError::IoError {
            path: dest.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(DownloadResult {
            path: dest.to_path_buf(),
            size: downloaded,
            checksum: hex::encode(hasher.finalize()),
        })
    }
}

impl Default for DownloadManager {
    fn default() -> Self {
        Self::new()
    }
}

fn partial_path(dest: &Path, owner: &str) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{owner}.part"));
    dest.with_file_name(name)
}

/// Verify SHA256 checksum of a file
pub async fn verify_checksum_async(path: &Path, expected: &str) -> Result<bool, DownloadError> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|e| DownloadError::IoError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

    Ok(compute_checksum(&content).eq_ignore_ascii_case(expected))
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
