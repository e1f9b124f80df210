//! Persisted state under the data directory.
//!
//! ```text
//! <data_dir>/
//! ├── registrations.json   registered components, keyed by id
//! ├── backups.json         backup snapshot records, keyed by component id
//! ├── audit.jsonl          append-only operation log
//! ├── notices.json         recent operator notices
//! ├── activation.json      active plugins and theme
//! ├── cache/{id}.json      cached update decisions
//! ├── backups/*.zip        backup archives
//! ├── tmp/                 downloads and extraction scratch space
//! └── .locks/{id}.lock     per-component locks
//! ```
//!
//! JSON documents are rewritten whole through [`atomic_write`]; the audit log
//! is appended line by line.

pub mod audit;
pub mod registrations;
pub mod snapshots;

pub use audit::{AuditLog, LogAction, LogEntry, LogStatus};
pub use registrations::RegistrationStore;
pub use snapshots::{BackupSnapshot, SnapshotStore};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use crate::utils::atomic_write;

/// Paths of everything stored under the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    /// Layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    /// The data directory itself.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn registrations(&self) -> PathBuf {
        self.root.join("registrations.json")
    }

    #[must_use]
    pub fn snapshots(&self) -> PathBuf {
        self.root.join("backups.json")
    }

    #[must_use]
    pub fn audit_log(&self) -> PathBuf {
        self.root.join("audit.jsonl")
    }

    #[must_use]
    pub fn notices(&self) -> PathBuf {
        self.root.join("notices.json")
    }

    #[must_use]
    pub fn activation(&self) -> PathBuf {
        self.root.join("activation.json")
    }

    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    #[must_use]
    pub fn backups_dir(&self) -> PathBuf {
        self.root.join("backups")
    }

    #[must_use]
    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    #[must_use]
    pub fn locks_dir(&self) -> PathBuf {
        self.root.join(".locks")
    }
}

/// Read a JSON document, returning the default value when the file is absent.
pub(crate) fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Pretty-print a JSON document and replace the file atomically.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_vec_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    atomic_write(path, &content)
}
