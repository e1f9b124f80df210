//! The `ghpush` binary against temporary sites.
//!
//! Only commands that stay offline are exercised here; the update pipeline
//! is covered through the facade in `update_flow`.

use assert_cmd::Command;
use github_push::backup::BackupManager;
use github_push::service::GitHubPush;
use predicates::prelude::*;

use crate::common::CliSite;

#[tokio::test]
async fn test_config_path_prints_selected_file() {
    let env = CliSite::new().await;
    env.ghpush()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(env.config_path().to_string_lossy().as_ref()));
}

#[test]
fn test_config_path_from_environment() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("custom.toml");

    Command::cargo_bin("ghpush")
        .unwrap()
        .args(["config", "path"])
        .env("GHPUSH_CONFIG_PATH", &path)
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_init_and_show() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("nested").join("config.toml");
    let ghpush = || {
        let mut cmd = Command::cargo_bin("ghpush").unwrap();
        cmd.arg("--config").arg(&path).env("NO_COLOR", "1");
        cmd
    };

    ghpush()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("file not found, showing defaults"))
        .stdout(predicate::str::contains("max_backups = 5"));

    ghpush()
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config"));
    assert!(path.exists());

    ghpush()
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));

    ghpush().args(["config", "init", "--force"]).assert().success();
    ghpush()
        .args(["config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cache_ttl").and(predicate::str::contains("defaults").not()));
}

#[test]
fn test_invalid_config_is_reported() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "max_backups = 0\n").unwrap();

    Command::cargo_bin("ghpush")
        .unwrap()
        .arg("--config")
        .arg(&path)
        .args(["component", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_backups must be at least 1"));
}

#[tokio::test]
async fn test_component_lifecycle() {
    let env = CliSite::new().await;
    env.ghpush()
        .args(["component", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No components registered."));

    env.add_plugin("shop", "1.4.2");

    env.ghpush()
        .args(["component", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("shop").and(predicate::str::contains("acme/shop")));

    let output = env.ghpush().args(["component", "list", "--json"]).output().unwrap();
    assert!(output.status.success());
    let listed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(listed[0]["id"], "shop");
    assert_eq!(listed[0]["install_slug"], "shop/shop.php");

    env.ghpush()
        .args(["component", "show", "shop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("installed:  1.4.2"))
        .stdout(predicate::str::contains("active:     no"));

    env.ghpush().args(["component", "activate", "shop"]).assert().success();
    env.ghpush()
        .args(["component", "show", "shop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("active:     yes"));

    env.ghpush()
        .args(["version", "shop"])
        .assert()
        .success()
        .stdout(predicate::eq("1.4.2\n"));

    env.ghpush()
        .args(["component", "remove", "shop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed component"));
    env.ghpush().args(["version", "shop"]).assert().failure();
}

#[tokio::test]
async fn test_duplicate_slug_is_rejected() {
    let env = CliSite::new().await;
    env.add_plugin("shop", "1.0.0");

    env.ghpush()
        .args(["component", "add", "--repo", "https://github.com/other/shop"])
        .args(["--slug", "shop/shop.php", "--id", "shop-fork", "--no-verify"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already registered as 'shop'"));
}

#[tokio::test]
async fn test_invalid_repository_url() {
    let env = CliSite::new().await;
    env.ghpush()
        .args(["component", "add", "--repo", "https://gitlab.com/acme/shop"])
        .args(["--slug", "shop/shop.php", "--no-verify"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid GitHub URL"));
}

#[tokio::test]
async fn test_unknown_component_suggests_close_match() {
    let env = CliSite::new().await;
    env.add_plugin("shop", "1.0.0");

    env.ghpush()
        .args(["version", "shpo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Component 'shpo' is not registered"))
        .stderr(predicate::str::contains("Did you mean 'shop'?"));
}

#[tokio::test]
async fn test_rollback_without_backup_fails() {
    let env = CliSite::new().await;
    env.add_plugin("shop", "1.0.0");

    env.ghpush()
        .args(["backups", "shop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No backups for 'shop'."));

    env.ghpush()
        .args(["rollback", "shop"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No backup available for component 'shop'"));

    env.ghpush()
        .args(["logs", "--component", "shop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rollback").and(predicate::str::contains("error")));
}

#[tokio::test]
async fn test_rollback_restores_backup() {
    let env = CliSite::new().await;
    env.add_plugin("shop", "1.0.0");

    let push = GitHubPush::from_config(env.site.config()).unwrap();
    let registration = push.component("shop").unwrap();
    let backups = BackupManager::new(env.site.paths(), push.layout(), 5);
    let snapshot = backups.create_backup(&registration).await.unwrap();

    env.site.install_plugin("shop", "2.0.0");
    env.site.write_plugin_file("shop", "upgrade.php", "<?php");

    env.ghpush()
        .args(["backups", "shop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("version 1.0.0"));

    env.ghpush()
        .args(["rollback", "shop", "--version", "1.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Rolled back to version 1.0.0"))
        .stdout(predicate::str::contains(snapshot.path.file_name().unwrap().to_string_lossy().as_ref()));

    assert_eq!(push.get_current_version("shop").unwrap(), "1.0.0");
    assert!(!env.site.plugin_dir("shop").join("upgrade.php").exists());

    env.ghpush()
        .args(["notices"])
        .assert()
        .success()
        .stdout(predicate::str::contains("shop: Rolled back to version 1.0.0"));
    env.ghpush()
        .args(["notices", "--clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Notices cleared"));
    env.ghpush().args(["notices"]).assert().success().stdout(predicate::str::contains("No notices."));
}

#[tokio::test]
async fn test_rollback_by_log_entry() {
    let env = CliSite::new().await;
    env.add_plugin("shop", "1.0.0");

    let push = GitHubPush::from_config(env.site.config()).unwrap();
    let registration = push.component("shop").unwrap();
    BackupManager::new(env.site.paths(), push.layout(), 5)
        .create_backup(&registration)
        .await
        .unwrap();
    // A failed rollback attempt leaves an audit entry stamped after the backup
    env.site.install_plugin("shop", "2.0.0");
    env.ghpush().args(["rollback", "shop", "--backup", "/nonexistent.zip"]).assert().failure();
    let entry = push.get_logs(Some("shop"), 1, 0).unwrap().remove(0);

    env.ghpush()
        .args(["rollback", "shop", "--log-entry"])
        .arg(entry.id.to_string())
        .assert()
        .success()
        .stdout(predicate::str::contains("Rolled back to version 1.0.0"));
    assert_eq!(push.get_current_version("shop").unwrap(), "1.0.0");

    env.ghpush()
        .args(["rollback", "shop", "--log-entry", "4242"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no audit log entry with id 4242"));
}

#[tokio::test]
async fn test_logs_pagination() {
    let env = CliSite::new().await;
    env.ghpush()
        .args(["logs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No log entries."));

    env.add_plugin("shop", "1.0.0");
    for _ in 0..3 {
        env.ghpush().args(["rollback", "shop"]).assert().failure();
    }

    env.ghpush()
        .args(["logs", "--limit", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 of 3 entries shown; use --offset 2 for more"));

    let output = env.ghpush().args(["logs", "--json", "--offset", "2"]).output().unwrap();
    let entries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(entries.as_array().unwrap().len(), 1);
    assert_eq!(entries[0]["id"], 1);
    assert_eq!(entries[0]["action"], "rollback");
}
