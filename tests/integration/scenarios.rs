//! Version checks and backups against fixed repository states.

use anyhow::Result;
use github_push::backup::BackupManager;
use github_push::core::{ErrorKind, GhPushError, RefSelector};
use github_push::github::{LocateStrategy, RepoRef, VersionFileHint, VersionLocator};
use github_push::test_utils::{FakeGitHub, TestSite};
use std::sync::Arc;

use crate::common::{new_plugin, plugin_header, tag_url};

fn main_branch() -> RefSelector {
    RefSelector::Branch {
        name: "main".to_string(),
    }
}

/// Tag mode picks the first tag and points at its archive.
#[tokio::test]
async fn test_tag_mode_reports_newer_release() -> Result<()> {
    let site = TestSite::new();
    site.install_plugin("shop", "1.1.0");
    let fake = Arc::new(FakeGitHub::new());
    fake.set_tags("acme", "shop", &["v1.2.0", "v1.1.0"]);
    let push = site.push(fake);
    push.register_component(new_plugin("shop", RefSelector::Tag))?;

    let decision = push.check_for_updates("shop", false).await?;
    assert!(decision.update_available);
    assert_eq!(decision.current_version, "1.1.0");
    assert_eq!(decision.latest_version, "1.2.0");
    assert_eq!(decision.download_url.as_deref(), Some(tag_url("shop", "v1.2.0").as_str()));
    Ok(())
}

/// Branch mode compares the header at the branch head with the installed one.
#[tokio::test]
async fn test_branch_mode_same_version_is_up_to_date() -> Result<()> {
    let site = TestSite::new();
    site.install_plugin("shop", "2.0.1");
    let fake = Arc::new(FakeGitHub::new());
    fake.add_file("acme", "shop", "main", "shop.php", &plugin_header("shop", "2.0.1"));
    let push = site.push(fake);
    push.register_component(new_plugin("shop", main_branch()))?;

    let decision = push.check_for_updates("shop", false).await?;
    assert!(!decision.update_available);
    assert_eq!(decision.latest_version, "2.0.1");
    assert!(decision.error.is_none());
    assert_eq!(decision.reference.as_deref(), Some("main"));
    Ok(())
}

/// When the hinted file is missing the root PHP file with a header is used.
#[tokio::test]
async fn test_header_scan_finds_renamed_main_file() -> Result<()> {
    let fake = FakeGitHub::new();
    fake.add_file("acme", "shop", "main", "readme.txt", "Shop plugin");
    fake.add_file("acme", "shop", "main", "helpers.php", "<?php // helpers");
    fake.add_file("acme", "shop", "main", "shop-main.php", &plugin_header("Shop", "1.3.0"));

    let repo = RepoRef::new("acme", "shop");
    let hint = VersionFileHint::for_component(github_push::core::ComponentKind::Plugin, "shop/shop.php");
    let mut locator = VersionLocator::new(&fake, &repo, "main", None);
    assert_eq!(locator.locate(&hint).await?, "shop-main.php");

    let mut tree_only = VersionLocator::new(&fake, &repo, "main", None);
    assert_eq!(tree_only.locate_with(&hint, &LocateStrategy::TREE_SEARCH).await?, "shop-main.php");
    Ok(())
}

/// The same fallback drives a branch-mode check end to end.
#[tokio::test]
async fn test_branch_check_uses_header_scan() -> Result<()> {
    let site = TestSite::new();
    site.install_plugin("shop", "1.2.0");
    let fake = Arc::new(FakeGitHub::new());
    fake.add_file("acme", "shop", "main", "shop-main.php", &plugin_header("Shop", "1.3.0"));
    let push = site.push(fake);
    push.register_component(new_plugin("shop", main_branch()))?;

    let decision = push.check_for_updates("shop", true).await?;
    assert!(decision.update_available);
    assert_eq!(decision.latest_version, "1.3.0");
    assert_eq!(
        decision.download_url.as_deref(),
        Some("https://github.com/acme/shop/archive/refs/heads/main.zip")
    );
    Ok(())
}

/// Backing up a component that is not installed fails without writing a zip.
#[tokio::test]
async fn test_backup_of_missing_install_dir() -> Result<()> {
    let site = TestSite::new();
    let push = site.push(Arc::new(FakeGitHub::new()));
    let registration = push.register_component(new_plugin("ghost", RefSelector::Tag))?;

    let backups = BackupManager::new(site.paths(), push.layout(), 5);
    let err = backups.create_backup(&registration).await.unwrap_err();
    let push_error = err.downcast_ref::<GhPushError>().expect("typed error");
    assert!(matches!(push_error, GhPushError::InstallDirNotFound { .. }));
    assert_eq!(push_error.kind(), ErrorKind::NotFound);

    let backups_dir = push.backups_dir();
    let zips = std::fs::read_dir(&backups_dir)
        .map(|entries| entries.filter_map(Result::ok).count())
        .unwrap_or(0);
    assert_eq!(zips, 0);
    assert!(backups.list_backups("ghost")?.is_empty());
    Ok(())
}

/// `1.0` and `1.0.0` are the same version.
#[tokio::test]
async fn test_padded_versions_are_equal() -> Result<()> {
    let site = TestSite::new();
    site.install_plugin("shop", "1.0");
    let fake = Arc::new(FakeGitHub::new());
    fake.set_tags("acme", "shop", &["v1.0.0"]);
    let push = site.push(fake);
    push.register_component(new_plugin("shop", RefSelector::Tag))?;

    assert!(!push.check_for_updates("shop", false).await?.update_available);
    Ok(())
}

/// Registration validation finds the file and its headers.
#[tokio::test]
async fn test_validate_repository_before_registering() -> Result<()> {
    let site = TestSite::new();
    let fake = Arc::new(FakeGitHub::new());
    fake.add_file("acme", "shop", "main", "shop.php", &plugin_header("Shop", "3.1.4"));
    let push = site.push(fake);

    let report = push
        .validate_repository(
            "https://github.com/acme/shop",
            "shop/shop.php",
            github_push::core::ComponentKind::Plugin,
            "main",
            None,
        )
        .await?;
    assert_eq!(report.path, "shop.php");
    assert_eq!(report.name, "Shop");
    assert_eq!(report.version, "3.1.4");

    let err = push
        .validate_repository(
            "https://github.com/acme/missing",
            "shop/shop.php",
            github_push::core::ComponentKind::Plugin,
            "main",
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.downcast_ref::<GhPushError>().unwrap().kind(), ErrorKind::NotFound);
    Ok(())
}
