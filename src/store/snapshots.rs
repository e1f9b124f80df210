//! Backup snapshot records, keyed by component id.
//!
//! Records are kept in ascending `created_at` order. The archives they point
//! at live in `<data_dir>/backups/`; [`crate::backup::BackupManager`] owns
//! retention and file deletion.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{read_json, write_json};

/// A retained zip of a component taken before an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSnapshot {
    /// Owning component
    pub component_id: String,
    /// Archive location
    pub path: PathBuf,
    /// Installed version at the time of the backup
    pub version: String,
    /// When the archive was written
    pub created_at: DateTime<Utc>,
    /// SHA-256 of the archive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl BackupSnapshot {
    /// True when the archive is still on disk.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

/// `backups.json` accessor.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    fn load(&self) -> Result<BTreeMap<String, Vec<BackupSnapshot>>> {
        read_json(&self.path)
    }

    /// Records for one component, oldest first.
    pub fn list(&self, component_id: &str) -> Result<Vec<BackupSnapshot>> {
        Ok(self.load()?.remove(component_id).unwrap_or_default())
    }

    /// Replace the records of one component.
    pub fn replace(&self, component_id: &str, snapshots: Vec<BackupSnapshot>) -> Result<()> {
        let mut all = self.load()?;
        if snapshots.is_empty() {
            all.remove(component_id);
        } else {
            all.insert(component_id.to_string(), snapshots);
        }
        write_json(&self.path, &all)
    }

    /// Drop every record of one component and return them.
    pub fn remove_all(&self, component_id: &str) -> Result<Vec<BackupSnapshot>> {
        let mut all = self.load()?;
        let removed = all.remove(component_id).unwrap_or_default();
        if !removed.is_empty() {
            write_json(&self.path, &all)?;
        }
        Ok(removed)
    }
}
