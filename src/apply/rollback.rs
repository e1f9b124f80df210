//! Restoring a backup snapshot.
//!
//! The archive is verified and extracted into scratch space *before* the
//! install directory is deleted, so a corrupt backup never leaves the
//! component half-removed. The snapshot list is not changed by a rollback.

use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{ApplyEngine, ApplyStage, extract_payload, failure, remove_scratch_dir, swap_blocking};
use crate::core::{GhPushError, Registration};
use crate::lock::ComponentLock;
use crate::notify::{Notice, NoticeKind};
use crate::store::{LogAction, LogStatus};
use crate::utils::calculate_checksum;

/// Result of [`ApplyEngine::rollback`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackOutcome {
    pub component_id: String,
    /// Archive that was restored
    pub backup_path: PathBuf,
    pub message: String,
}

impl ApplyEngine {
    /// Restore `backup_path`, or the newest existing backup when `None`.
    ///
    /// `version_label` only affects the recorded message.
    ///
    /// # Errors
    ///
    /// - [`GhPushError::Busy`] when another operation holds the lock
    /// - [`GhPushError::BackupNotFound`] when the given archive is missing
    /// - [`GhPushError::NoBackup`] when no archive exists at all
    /// - [`GhPushError::BackupChecksumMismatch`] when the archive changed
    pub async fn rollback(
        &self,
        registration: &Registration,
        backup_path: Option<&Path>,
        version_label: Option<&str>,
    ) -> Result<RollbackOutcome> {
        match self.run_rollback(registration, backup_path, version_label).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.report_failure(registration, LogAction::Rollback, &e);
                Err(e)
            }
        }
    }

    async fn run_rollback(
        &self,
        registration: &Registration,
        backup_path: Option<&Path>,
        version_label: Option<&str>,
    ) -> Result<RollbackOutcome> {
        let at = |stage| failure("Rollback", registration, stage);

        let _lock = ComponentLock::acquire(&self.layout.locks_dir(), &registration.id)
            .await
            .map_err(|e| at(ApplyStage::ResolveContext)(e.into()))?;

        let (archive, expected_checksum) = match backup_path {
            Some(path) => {
                if !path.is_file() {
                    return Err(at(ApplyStage::ResolveContext)(
                        GhPushError::BackupNotFound {
                            path: path.display().to_string(),
                        }
                        .into(),
                    ));
                }
                let record = self
                    .backups
                    .find_by_path(&registration.id, path)
                    .map_err(at(ApplyStage::ResolveContext))?;
                (path.to_path_buf(), record.and_then(|r| r.checksum))
            }
            None => {
                let latest = self
                    .backups
                    .get_latest_backup(&registration.id)
                    .map_err(at(ApplyStage::ResolveContext))?;
                (latest.path, latest.checksum)
            }
        };

        let context = self
            .site
            .resolve_context(registration, self.activation.as_ref())
            .map_err(at(ApplyStage::ResolveContext))?;

        if let Some(expected) = expected_checksum {
            let path = archive.clone();
            let actual = tokio::task::spawn_blocking(move || calculate_checksum(&path))
                .await
                .map_err(|e| at(ApplyStage::Extract)(e.into()))?
                .map_err(at(ApplyStage::Extract))?;
            if actual != expected {
                return Err(at(ApplyStage::Extract)(
                    GhPushError::BackupChecksumMismatch {
                        path: archive.display().to_string(),
                        expected,
                        actual,
                    }
                    .into(),
                ));
            }
        }

        let extract_dir = self.scratch_dir("rollback");
        let payload = match extract_payload(archive.clone(), extract_dir.clone()).await {
            Ok(payload) => payload,
            Err(e) => {
                remove_scratch_dir(&extract_dir).await;
                return Err(at(ApplyStage::Extract)(e));
            }
        };

        let swapped = swap_blocking(payload, context.dir.clone()).await;
        remove_scratch_dir(&extract_dir).await;
        swapped.map_err(at(ApplyStage::Swap))?;

        if context.active {
            self.activation.activate(registration).map_err(at(ApplyStage::Reactivate))?;
        }

        self.invalidate_cache(&registration.id);
        let message = match version_label {
            Some(label) => format!("Rolled back to version {label}"),
            None => "Rolled back".to_string(),
        };
        self.log(registration, LogAction::Rollback, LogStatus::Success, &message, version_label);
        self.notifier.notify(Notice::new(
            &registration.id,
            NoticeKind::RolledBack,
            format!("{}: {message}", registration.name),
        ));
        info!("{}: {message} from {}", registration.id, archive.display());

        Ok(RollbackOutcome {
            component_id: registration.id.clone(),
            backup_path: archive,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::ApplyFailure;
    use crate::archive::ArchiveFetcher;
    use crate::backup::BackupManager;
    use crate::core::{ErrorKind, RefSelector};
    use crate::resolver::DecisionCache;
    use crate::store::{AuditLog, DataLayout};
    use crate::test_utils::{FakeGitHub, RecordingNotifier, TestSite};
    use std::sync::Arc;

    struct Harness {
        site: TestSite,
        notifier: Arc<RecordingNotifier>,
        backups: Arc<BackupManager>,
        engine: ApplyEngine,
    }

    fn harness() -> Harness {
        let site = TestSite::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let layout = DataLayout::new(site.data_dir());
        let backups = Arc::new(BackupManager::new(site.paths(), &layout, 5));
        let engine = ApplyEngine::new(
            site.paths(),
            layout.clone(),
            backups.clone(),
            ArchiveFetcher::new(Arc::new(FakeGitHub::new()), layout.tmp_dir()),
            DecisionCache::new(layout.cache_dir()),
            AuditLog::new(layout.audit_log()),
            site.activation(),
            notifier.clone(),
        );
        Harness {
            site,
            notifier,
            backups,
            engine,
        }
    }

    #[tokio::test]
    async fn test_rollback_restores_latest_backup() {
        let h = harness();
        h.site.install_plugin("shop", "1.0.0");
        let registration = h.site.plugin_registration("shop", RefSelector::Tag);
        let snapshot = h.backups.create_backup(&registration).await.unwrap();

        h.site.install_plugin("shop", "2.0.0");
        h.site.write_plugin_file("shop", "new-only.php", "<?php");

        let outcome = h.engine.rollback(&registration, None, Some("1.0.0")).await.unwrap();
        assert_eq!(outcome.message, "Rolled back to version 1.0.0");
        assert_eq!(outcome.backup_path, snapshot.path);
        assert_eq!(h.site.paths().installed_version(&registration), "1.0.0");
        assert!(!h.site.plugin_dir("shop").join("new-only.php").exists());
        assert_eq!(h.notifier.kinds(), vec![NoticeKind::RolledBack]);

        assert_eq!(h.backups.list_backups("shop").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_without_label() {
        let h = harness();
        h.site.install_plugin("shop", "1.0.0");
        let registration = h.site.plugin_registration("shop", RefSelector::Tag);
        let snapshot = h.backups.create_backup(&registration).await.unwrap();

        let outcome =
            h.engine.rollback(&registration, Some(&snapshot.path), None).await.unwrap();
        assert_eq!(outcome.message, "Rolled back");
    }

    #[tokio::test]
    async fn test_missing_backup_path() {
        let h = harness();
        h.site.install_plugin("shop", "1.0.0");
        let registration = h.site.plugin_registration("shop", RefSelector::Tag);
        let missing = h.site.data_dir().join("backups").join("nope.zip");

        let err = h.engine.rollback(&registration, Some(&missing), None).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GhPushError>(),
            Some(GhPushError::BackupNotFound { .. })
        ));
        assert_eq!(h.site.paths().installed_version(&registration), "1.0.0");
        assert_eq!(h.notifier.kinds(), vec![NoticeKind::Error]);
    }

    #[tokio::test]
    async fn test_no_backups_at_all() {
        let h = harness();
        let registration = h.site.plugin_registration("shop", RefSelector::Tag);
        let err = h.engine.rollback(&registration, None, None).await.unwrap_err();
        assert_eq!(err.downcast_ref::<GhPushError>().unwrap().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_tampered_backup_is_rejected_before_delete() {
        let h = harness();
        h.site.install_plugin("shop", "1.0.0");
        let registration = h.site.plugin_registration("shop", RefSelector::Tag);
        let snapshot = h.backups.create_backup(&registration).await.unwrap();
        std::fs::write(&snapshot.path, b"tampered").unwrap();

        h.site.install_plugin("shop", "2.0.0");
        let err = h.engine.rollback(&registration, None, None).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GhPushError>(),
            Some(GhPushError::BackupChecksumMismatch { .. })
        ));
        assert_eq!(err.downcast_ref::<ApplyFailure>().unwrap().stage, ApplyStage::Extract);
        assert_eq!(h.site.paths().installed_version(&registration), "2.0.0");
    }

    #[tokio::test]
    async fn test_corrupt_unrecorded_archive_leaves_install() {
        let h = harness();
        h.site.install_plugin("shop", "2.0.0");
        let registration = h.site.plugin_registration("shop", RefSelector::Tag);
        let stray = h.site.data_dir().join("stray.zip");
        std::fs::create_dir_all(h.site.data_dir()).unwrap();
        std::fs::write(&stray, b"garbage").unwrap();

        assert!(h.engine.rollback(&registration, Some(&stray), None).await.is_err());
        assert_eq!(h.site.paths().installed_version(&registration), "2.0.0");
    }
}
