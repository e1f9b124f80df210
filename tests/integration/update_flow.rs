//! Update pipeline through the facade.

use anyhow::Result;
use github_push::apply::{ApplyFailure, ApplyStage, UpdateStatus};
use github_push::core::{ErrorKind, GhPushError, RefSelector};
use github_push::lock::ComponentLock;
use github_push::notify::NoticeKind;
use github_push::store::{LogAction, LogStatus};
use github_push::test_utils::{FakeGitHub, RecordingNotifier, TestSite, zip_bytes};
use std::sync::Arc;

use crate::common::{new_plugin, plugin_header, tag_url};

struct Fixture {
    site: TestSite,
    fake: Arc<FakeGitHub>,
    notifier: Arc<RecordingNotifier>,
}

/// `shop` 1.1.0 installed and registered in tag mode; `v1.2.0` is released.
fn fixture() -> Fixture {
    let site = TestSite::new();
    site.install_plugin("shop", "1.1.0");
    site.write_plugin_file("shop", "includes/legacy.php", "<?php // removed in 1.2.0");
    let fake = Arc::new(FakeGitHub::new());
    fake.set_tags("acme", "shop", &["v1.2.0", "v1.1.0"]);
    Fixture {
        site,
        fake,
        notifier: Arc::new(RecordingNotifier::default()),
    }
}

fn release_archive() -> Vec<u8> {
    zip_bytes(&[
        ("shop-1.2.0/shop.php", &plugin_header("shop", "1.2.0")),
        ("shop-1.2.0/includes/api.php", "<?php // new in 1.2.0"),
    ])
}

#[tokio::test]
async fn test_update_installs_release_and_keeps_backup() -> Result<()> {
    let f = fixture();
    f.fake.set_archive(&tag_url("shop", "v1.2.0"), release_archive());
    let push = f.site.push_with(f.fake.clone(), f.notifier.clone());
    push.register_component(new_plugin("shop", RefSelector::Tag))?;
    push.set_active("shop", true)?;

    let outcome = push.update_plugin("shop").await?;
    assert_eq!(outcome.status, UpdateStatus::Updated);
    assert_eq!(outcome.previous_version, "1.1.0");
    assert_eq!(outcome.version, "1.2.0");

    assert_eq!(push.get_current_version("shop")?, "1.2.0");
    let tree = f.site.snapshot_tree("shop");
    assert!(tree.contains_key("includes/api.php"));
    assert!(!tree.contains_key("includes/legacy.php"));
    assert!(push.is_active("shop")?);

    let backups = push.list_backups("shop")?;
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].version, "1.1.0");
    assert!(backups[0].exists());

    let logs = push.get_logs(Some("shop"), 10, 0)?;
    let actions: Vec<_> = logs.iter().map(|e| (e.action, e.status)).collect();
    assert_eq!(
        actions,
        vec![(LogAction::Update, LogStatus::Success), (LogAction::Backup, LogStatus::Success)]
    );
    assert_eq!(f.notifier.kinds(), vec![NoticeKind::Updated]);

    // Nothing left in scratch space
    let tmp = push.layout().tmp_dir();
    assert!(!tmp.exists() || std::fs::read_dir(&tmp)?.next().is_none());
    Ok(())
}

#[tokio::test]
async fn test_update_when_current_changes_nothing() -> Result<()> {
    let f = fixture();
    f.fake.set_tags("acme", "shop", &["v1.1.0"]);
    let push = f.site.push_with(f.fake.clone(), f.notifier.clone());
    push.register_component(new_plugin("shop", RefSelector::Tag))?;
    let before = f.site.snapshot_tree("shop");

    let outcome = push.update_plugin("shop").await?;
    assert_eq!(outcome.status, UpdateStatus::NoUpdate);
    assert_eq!(outcome.message(), "No update available");
    assert_eq!(f.site.snapshot_tree("shop"), before);
    assert!(push.list_backups("shop")?.is_empty());
    assert!(!push.layout().backups_dir().exists());
    assert!(f.fake.requests().iter().all(|r| !r.starts_with("download")));
    assert!(f.notifier.kinds().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failed_download_leaves_install_untouched() -> Result<()> {
    let f = fixture();
    let push = f.site.push_with(f.fake.clone(), f.notifier.clone());
    push.register_component(new_plugin("shop", RefSelector::Tag))?;
    let before = f.site.snapshot_tree("shop");

    let err = push.update_plugin("shop").await.unwrap_err();
    let failure = err.downcast_ref::<ApplyFailure>().expect("stage context");
    assert_eq!(failure.stage, ApplyStage::Download);
    assert_eq!(err.downcast_ref::<GhPushError>().unwrap().kind(), ErrorKind::Api);

    assert_eq!(f.site.snapshot_tree("shop"), before);
    assert_eq!(f.notifier.kinds(), vec![NoticeKind::Error]);

    // The backup taken before the download is still usable
    assert_eq!(push.list_backups("shop")?.len(), 1);
    let latest = push.get_logs(Some("shop"), 1, 0)?;
    assert_eq!(latest[0].action, LogAction::Update);
    assert_eq!(latest[0].status, LogStatus::Error);
    Ok(())
}

#[tokio::test]
async fn test_corrupt_archive_fails_at_extract() -> Result<()> {
    let f = fixture();
    f.fake.set_archive(&tag_url("shop", "v1.2.0"), b"not a zip".to_vec());
    let push = f.site.push_with(f.fake.clone(), f.notifier.clone());
    push.register_component(new_plugin("shop", RefSelector::Tag))?;
    let before = f.site.snapshot_tree("shop");

    let err = push.update_plugin("shop").await.unwrap_err();
    assert_eq!(err.downcast_ref::<ApplyFailure>().unwrap().stage, ApplyStage::Extract);
    assert_eq!(f.site.snapshot_tree("shop"), before);
    Ok(())
}

#[tokio::test]
async fn test_check_failure_during_update_is_reported() -> Result<()> {
    let f = fixture();
    f.fake.fail_requests(
        "tags acme/shop",
        GhPushError::ApiError {
            status: Some(500),
            message: "Server Error".to_string(),
        },
    );
    let push = f.site.push_with(f.fake.clone(), f.notifier.clone());
    push.register_component(new_plugin("shop", RefSelector::Tag))?;

    let err = push.update_plugin("shop").await.unwrap_err();
    assert_eq!(err.downcast_ref::<GhPushError>().unwrap().kind(), ErrorKind::Api);
    assert_eq!(f.notifier.kinds(), vec![NoticeKind::Error]);
    assert!(push.list_backups("shop")?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_update_refused_while_component_locked() -> Result<()> {
    let f = fixture();
    f.fake.set_archive(&tag_url("shop", "v1.2.0"), release_archive());
    let push = f.site.push_with(f.fake.clone(), f.notifier.clone());
    push.register_component(new_plugin("shop", RefSelector::Tag))?;

    let held = ComponentLock::acquire(&push.layout().locks_dir(), "shop").await?;
    let err = push.update_plugin("shop").await.unwrap_err();
    assert_eq!(err.downcast_ref::<GhPushError>().unwrap().kind(), ErrorKind::Busy);
    assert_eq!(push.get_current_version("shop")?, "1.1.0");
    assert!(f.fake.requests().iter().all(|r| !r.starts_with("download")));

    drop(held);
    assert_eq!(push.update_plugin("shop").await?.status, UpdateStatus::Updated);
    Ok(())
}

#[tokio::test]
async fn test_check_all_applies_updates_when_enabled() -> Result<()> {
    let f = fixture();
    f.fake.set_archive(&tag_url("shop", "v1.2.0"), release_archive());
    f.site.install_plugin("blog", "2.0.0");
    f.fake.set_tags("acme", "blog", &["v2.0.0"]);

    let mut config = f.site.config();
    config.auto_update = true;
    let push = github_push::service::GitHubPush::builder(config)
        .github(f.fake.clone())
        .notifier(f.notifier.clone())
        .build()?;
    push.register_component(new_plugin("shop", RefSelector::Tag))?;
    push.register_component(new_plugin("blog", RefSelector::Tag))?;

    let results = push.check_all().await?;
    let shop = results.iter().find(|r| r.component_id == "shop").unwrap();
    assert!(shop.error.is_none());
    assert_eq!(shop.outcome.as_ref().map(|o| o.status), Some(UpdateStatus::Updated));
    let blog = results.iter().find(|r| r.component_id == "blog").unwrap();
    assert!(blog.outcome.is_none());
    assert_eq!(blog.summary(), "up to date at 2.0.0");

    assert_eq!(push.get_current_version("shop")?, "1.2.0");
    Ok(())
}
