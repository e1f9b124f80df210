//! Restoring backups after updates.

use anyhow::Result;
use github_push::apply::{ApplyFailure, ApplyStage};
use github_push::core::{ErrorKind, GhPushError, RefSelector};
use github_push::notify::NoticeKind;
use github_push::store::{LogAction, LogStatus};
use github_push::test_utils::{FakeGitHub, RecordingNotifier, TestSite, zip_bytes};
use std::sync::Arc;

use crate::common::{new_plugin, plugin_header, tag_url};

/// Install 1.0.0, then update to 1.1.0 through the pipeline.
async fn updated_site() -> Result<(TestSite, github_push::service::GitHubPush, Arc<RecordingNotifier>)> {
    let site = TestSite::new();
    site.install_plugin("shop", "1.0.0");
    site.write_plugin_file("shop", "assets/app.js", "console.log('1.0.0');");

    let fake = Arc::new(FakeGitHub::new());
    fake.set_tags("acme", "shop", &["v1.1.0"]);
    fake.set_archive(
        &tag_url("shop", "v1.1.0"),
        zip_bytes(&[("shop-1.1.0/shop.php", &plugin_header("shop", "1.1.0"))]),
    );
    let notifier = Arc::new(RecordingNotifier::default());
    let push = site.push_with(fake, notifier.clone());
    push.register_component(new_plugin("shop", RefSelector::Tag))?;
    push.update_plugin("shop").await?;
    assert_eq!(push.get_current_version("shop")?, "1.1.0");
    Ok((site, push, notifier))
}

#[tokio::test]
async fn test_rollback_restores_pre_update_tree() -> Result<()> {
    let (site, push, notifier) = updated_site().await?;

    let outcome = push.rollback("shop", None, Some("1.0.0")).await?;
    assert_eq!(outcome.message, "Rolled back to version 1.0.0");
    assert_eq!(push.get_current_version("shop")?, "1.0.0");
    assert_eq!(
        site.snapshot_tree("shop").get("assets/app.js").map(Vec::as_slice),
        Some(b"console.log('1.0.0');".as_slice())
    );

    let latest = &push.get_logs(Some("shop"), 1, 0)?[0];
    assert_eq!(latest.action, LogAction::Rollback);
    assert_eq!(latest.status, LogStatus::Success);
    assert_eq!(latest.version.as_deref(), Some("1.0.0"));
    assert_eq!(notifier.kinds().last(), Some(&NoticeKind::RolledBack));

    // Restoring does not consume the backup
    assert_eq!(push.list_backups("shop")?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_backup_for_update_log_entry() -> Result<()> {
    let (_site, push, _) = updated_site().await?;

    let update_entry = push
        .get_logs(Some("shop"), 10, 0)?
        .into_iter()
        .find(|e| e.action == LogAction::Update && e.status == LogStatus::Success)
        .expect("update entry");
    let snapshot = push.backup_for_log_entry(update_entry.id)?.expect("backup before update");
    assert_eq!(snapshot.version, "1.0.0");

    let outcome = push.rollback("shop", Some(&snapshot.path), None).await?;
    assert_eq!(outcome.backup_path, snapshot.path);
    assert_eq!(push.get_current_version("shop")?, "1.0.0");

    let err = push.backup_for_log_entry(9_999).unwrap_err();
    assert_eq!(err.downcast_ref::<GhPushError>().unwrap().kind(), ErrorKind::InvalidInput);
    Ok(())
}

#[tokio::test]
async fn test_rollback_without_backup() -> Result<()> {
    let site = TestSite::new();
    site.install_plugin("shop", "1.0.0");
    let notifier = Arc::new(RecordingNotifier::default());
    let push = site.push_with(Arc::new(FakeGitHub::new()), notifier.clone());
    push.register_component(new_plugin("shop", RefSelector::Tag))?;

    let err = push.rollback("shop", None, None).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<GhPushError>(), Some(GhPushError::NoBackup { .. })));
    assert_eq!(push.get_current_version("shop")?, "1.0.0");

    let latest = &push.get_logs(Some("shop"), 1, 0)?[0];
    assert_eq!((latest.action, latest.status), (LogAction::Rollback, LogStatus::Error));
    assert_eq!(notifier.kinds(), vec![NoticeKind::Error]);
    Ok(())
}

#[tokio::test]
async fn test_tampered_backup_is_not_restored() -> Result<()> {
    let (site, push, _) = updated_site().await?;
    let snapshot = push.list_backups("shop")?.remove(0);
    std::fs::write(&snapshot.path, zip_bytes(&[("shop.php", &plugin_header("shop", "6.6.6"))]))?;
    let before = site.snapshot_tree("shop");

    let err = push.rollback("shop", None, None).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GhPushError>(),
        Some(GhPushError::BackupChecksumMismatch { .. })
    ));
    assert_eq!(err.downcast_ref::<ApplyFailure>().unwrap().stage, ApplyStage::Extract);
    assert_eq!(site.snapshot_tree("shop"), before);
    Ok(())
}

#[tokio::test]
async fn test_removing_component_deletes_its_backups() -> Result<()> {
    let (_site, push, _) = updated_site().await?;
    let snapshot = push.list_backups("shop")?.remove(0);

    let removed = push.remove_component("shop", false)?;
    assert_eq!(removed.backups_removed, 1);
    assert!(!snapshot.path.exists());

    // The audit trail outlives the registration
    assert_eq!(push.get_log_count(Some("shop"))?, 2);
    assert!(push.component("shop").is_err());
    Ok(())
}
