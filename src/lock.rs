//! Per-component exclusive locks.
//!
//! An update or rollback holds `<data_dir>/.locks/{id}.lock` from the backup
//! step until reactivation. A second operation on the same component fails
//! immediately with [`GhPushError::Busy`] instead of waiting; operations on
//! different components never contend.
//!
//! # Example
//!
//! ```rust,no_run
//! use github_push::lock::ComponentLock;
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let _lock = ComponentLock::acquire(Path::new("/var/lib/ghpush/.locks"), "shop").await?;
//! // swap files...
//! // released when `_lock` goes out of scope
//! # Ok(())
//! # }
//! ```

use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::core::GhPushError;

/// Held for the duration of an update or rollback.
///
/// The OS lock is released when the file handle closes on drop.
#[derive(Debug)]
pub struct ComponentLock {
    _file: Arc<File>,
    component_id: String,
    path: PathBuf,
}

impl Drop for ComponentLock {
    fn drop(&mut self) {
        debug!(component = %self.component_id, "Component lock released");
    }
}

impl ComponentLock {
    /// Try to take the lock for `component_id` without waiting.
    ///
    /// # Errors
    ///
    /// [`GhPushError::Busy`] when another holder exists, IO errors when the
    /// lock file cannot be created.
    pub async fn acquire(locks_dir: &Path, component_id: &str) -> Result<Self, GhPushError> {
        tokio::fs::create_dir_all(locks_dir).await.map_err(|e| GhPushError::FileSystemError {
            operation: format!("create lock directory ({e})"),
            path: locks_dir.display().to_string(),
        })?;

        let path = locks_dir.join(format!("{component_id}.lock"));
        let open_path = path.clone();
        let file = tokio::task::spawn_blocking(move || {
            OpenOptions::new().create(true).write(true).truncate(false).open(&open_path)
        })
        .await
        .map_err(|e| GhPushError::Other {
            message: format!("lock task failed: {e}"),
        })??;
        let file = Arc::new(file);

        let handle = Arc::clone(&file);
        let locked = tokio::task::spawn_blocking(move || handle.try_lock_exclusive())
            .await
            .map_err(|e| GhPushError::Other {
                message: format!("lock task failed: {e}"),
            })?;

        match locked {
            Ok(true) => {
                debug!(component = %component_id, path = %path.display(), "Component lock acquired");
                Ok(Self {
                    _file: file,
                    component_id: component_id.to_string(),
                    path,
                })
            }
            Ok(false) => Err(GhPushError::Busy {
                id: component_id.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(GhPushError::Busy {
                id: component_id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Lock file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_second_acquire_is_busy() {
        let temp = TempDir::new().unwrap();
        let first = ComponentLock::acquire(temp.path(), "shop").await.unwrap();
        assert!(first.path().ends_with("shop.lock"));

        let err = ComponentLock::acquire(temp.path(), "shop").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Busy);
    }

    #[tokio::test]
    async fn test_released_on_drop() {
        let temp = TempDir::new().unwrap();
        {
            let _lock = ComponentLock::acquire(temp.path(), "shop").await.unwrap();
        }
        ComponentLock::acquire(temp.path(), "shop").await.unwrap();
    }

    #[tokio::test]
    async fn test_components_do_not_contend() {
        let temp = TempDir::new().unwrap();
        let _shop = ComponentLock::acquire(temp.path(), "shop").await.unwrap();
        let _blog = ComponentLock::acquire(temp.path(), "blog").await.unwrap();
    }

    #[tokio::test]
    async fn test_creates_missing_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("data").join(".locks");
        let lock = ComponentLock::acquire(&dir, "shop").await.unwrap();
        assert!(lock.path().exists());
    }
}
