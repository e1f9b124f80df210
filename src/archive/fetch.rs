//! Streaming archive downloads into the scratch directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::GhPushError;
use crate::github::GitHubApi;

/// Downloads release and branch archives.
pub struct ArchiveFetcher {
    github: Arc<dyn GitHubApi>,
    scratch_dir: PathBuf,
}

impl ArchiveFetcher {
    /// Fetcher writing into `scratch_dir` (`<data_dir>/tmp`).
    pub fn new(github: Arc<dyn GitHubApi>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            github,
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Download `url` into a uniquely named file and return its path.
    ///
    /// The caller owns the returned file and removes it when done.
    ///
    /// # Errors
    ///
    /// [`GhPushError::DownloadFailed`] for a non-200 response or a broken
    /// stream (the partial file is removed), and
    /// [`GhPushError::DownloadedFileMissing`] when nothing was written.
    pub async fn download_archive(
        &self,
        url: &str,
        token: Option<&str>,
    ) -> Result<PathBuf, GhPushError> {
        tokio::fs::create_dir_all(&self.scratch_dir).await.map_err(|e| {
            GhPushError::FileSystemError {
                operation: format!("create scratch directory ({e})"),
                path: self.scratch_dir.display().to_string(),
            }
        })?;

        let dest = self.reserve_path(url)?;
        debug!("Fetching {url} into {}", dest.display());

        if let Err(e) = self.github.download_archive(url, token, &dest).await {
            remove_partial(&dest).await;
            return Err(match e {
                GhPushError::DownloadFailed { .. } => e,
                other => GhPushError::DownloadFailed {
                    url: url.to_string(),
                    reason: other.to_string(),
                },
            });
        }

        let written = tokio::fs::metadata(&dest).await.map(|m| m.is_file()).unwrap_or(false);
        if !written {
            return Err(GhPushError::DownloadedFileMissing {
                path: dest.display().to_string(),
            });
        }

        info!("Downloaded {url}");
        Ok(dest)
    }

    /// Create an empty `ghpush-*-<basename>` file and keep it on disk.
    fn reserve_path(&self, url: &str) -> Result<PathBuf, GhPushError> {
        let basename = archive_basename(url);
        let suffix = format!("-{basename}");
        let file = tempfile::Builder::new()
            .prefix("ghpush-")
            .suffix(&suffix)
            .tempfile_in(&self.scratch_dir)?;
        let (_, path) = file.keep().map_err(|e| GhPushError::FileSystemError {
            operation: format!("reserve download file ({e})"),
            path: self.scratch_dir.display().to_string(),
        })?;
        Ok(path)
    }
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        debug!("Failed to remove partial download {}: {e}", path.display());
    }
}

/// Last URL segment without query, restricted to file-name-safe characters.
fn archive_basename(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let last = path.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    if cleaned.is_empty() { "archive.zip".to_string() } else { cleaned }
}
