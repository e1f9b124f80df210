//! Bounded zip backups of installed components.
//!
//! Before every update the install directory is zipped into
//! `<data_dir>/backups/{id}-{timestamp}.zip` and recorded as a
//! [`BackupSnapshot`] together with the installed version and the archive's
//! SHA-256. Only the newest `max_backups` snapshots per component are kept;
//! older archives and their records are deleted when a new backup pushes the
//! count over the limit.
//!
//! Entry names inside the archive are relative to the install directory and
//! always use `/`, so a backup restores identically on every platform.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::core::{GhPushError, Registration};
use crate::site::SitePaths;
use crate::store::{BackupSnapshot, DataLayout, SnapshotStore};
use crate::utils::{calculate_checksum, ensure_dir};

/// Creates, lists and prunes component backups.
pub struct BackupManager {
    site: SitePaths,
    backups_dir: PathBuf,
    snapshots: SnapshotStore,
    max_backups: usize,
}

impl BackupManager {
    pub fn new(site: SitePaths, layout: &DataLayout, max_backups: usize) -> Self {
        Self {
            site,
            backups_dir: layout.backups_dir(),
            snapshots: SnapshotStore::new(layout.snapshots()),
            max_backups: max_backups.max(1),
        }
    }

    /// Zip the component's install directory and record the snapshot.
    ///
    /// # Errors
    ///
    /// [`GhPushError::InstallDirNotFound`] when there is nothing to back up;
    /// no archive is created in that case.
    pub async fn create_backup(&self, registration: &Registration) -> Result<BackupSnapshot> {
        let install_dir = self.site.install_dir(registration)?;
        if !install_dir.is_dir() {
            return Err(GhPushError::InstallDirNotFound {
                kind: registration.kind,
                path: install_dir.display().to_string(),
            }
            .into());
        }

        let version = self.site.installed_version(registration);
        let created_at = Utc::now();
        ensure_dir(&self.backups_dir)?;

        let backups_dir = self.backups_dir.clone();
        let stem = format!("{}-{}", registration.id, created_at.format("%Y-%m-%d-%H-%M-%S-%3f"));
        let (path, checksum) = tokio::task::spawn_blocking(move || -> Result<(PathBuf, String)> {
            let (path, file) = create_unique(&backups_dir, &stem)?;
            let checksum = write_dir_zip(&install_dir, file)
                .with_context(|| format!("Failed to write backup {}", path.display()))
                .and_then(|()| calculate_checksum(&path));
            match checksum {
                Ok(checksum) => Ok((path, checksum)),
                Err(e) => {
                    remove_archive(&path);
                    Err(e)
                }
            }
        })
        .await
        .context("Backup task failed")??;

        let snapshot = BackupSnapshot {
            component_id: registration.id.clone(),
            path,
            version,
            created_at,
            checksum: Some(checksum),
        };

        // An archive without a record is never pruned
        if let Err(e) = self.record(&registration.id, snapshot.clone()) {
            remove_archive(&snapshot.path);
            return Err(e);
        }
        info!("Backed up {} ({}) to {}", registration.id, snapshot.version, snapshot.path.display());
        Ok(snapshot)
    }

    fn record(&self, component_id: &str, snapshot: BackupSnapshot) -> Result<()> {
        let mut all = self.snapshots.list(component_id)?;
        all.push(snapshot);
        self.prune_and_store(component_id, all)
    }

    /// Sort oldest first, delete everything beyond the newest `max_backups`.
    fn prune_and_store(&self, component_id: &str, mut snapshots: Vec<BackupSnapshot>) -> Result<()> {
        snapshots.sort_by_key(|s| s.created_at);
        let excess = snapshots.len().saturating_sub(self.max_backups);
        let pruned: Vec<_> = snapshots.drain(..excess).collect();
        self.snapshots.replace(component_id, snapshots)?;

        for old in pruned {
            remove_archive(&old.path);
            debug!("Pruned backup {}", old.path.display());
        }
        Ok(())
    }

    /// Snapshots newest first, including ones whose archive has vanished.
    pub fn list_backups(&self, component_id: &str) -> Result<Vec<BackupSnapshot>> {
        let mut snapshots = self.snapshots.list(component_id)?;
        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(snapshots)
    }

    /// Newest snapshot whose archive still exists.
    ///
    /// # Errors
    ///
    /// [`GhPushError::NoBackup`] when none exists.
    pub fn get_latest_backup(&self, component_id: &str) -> Result<BackupSnapshot> {
        self.list_backups(component_id)?
            .into_iter()
            .find(BackupSnapshot::exists)
            .ok_or_else(|| {
                GhPushError::NoBackup {
                    id: component_id.to_string(),
                }
                .into()
            })
    }

    /// Newest existing snapshot taken at or before `at`.
    ///
    /// Used to offer a rollback target for an audit log entry: the backup
    /// taken right before that update.
    pub fn backup_for_log_entry(
        &self,
        component_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<BackupSnapshot>> {
        Ok(self
            .list_backups(component_id)?
            .into_iter()
            .find(|s| s.created_at <= at && s.exists()))
    }

    /// Snapshot record for an archive path, if it belongs to the component.
    pub fn find_by_path(&self, component_id: &str, path: &Path) -> Result<Option<BackupSnapshot>> {
        Ok(self.snapshots.list(component_id)?.into_iter().find(|s| s.path == path))
    }

    /// Delete every snapshot of a component, archives included.
    pub fn remove_backups(&self, component_id: &str) -> Result<usize> {
        let removed = self.snapshots.remove_all(component_id)?;
        for snapshot in &removed {
            remove_archive(&snapshot.path);
        }
        Ok(removed.len())
    }
}

fn remove_archive(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to delete backup {}: {e}", path.display()),
    }
}

/// Create `{stem}.zip`, or `{stem}-N.zip` when taken.
fn create_unique(dir: &Path, stem: &str) -> Result<(PathBuf, fs::File)> {
    for n in 0..1000u32 {
        let name = if n == 0 { format!("{stem}.zip") } else { format!("{stem}-{n}.zip") };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to create {}", path.display()));
            }
        }
    }
    anyhow::bail!("No free backup file name for {stem} in {}", dir.display())
}

/// Write every file and directory under `src` into a zip.
fn write_dir_zip(src: &Path, file: fs::File) -> Result<()> {
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src)?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{name}/"), options)?;
        } else if entry.file_type().is_file() {
            zip.start_file(name, options)?;
            let mut source = fs::File::open(entry.path())
                .with_context(|| format!("Failed to read {}", entry.path().display()))?;
            io::copy(&mut source, &mut zip)?;
        }
    }

    zip.finish()?;
    Ok(())
}
