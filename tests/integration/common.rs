//! Shared helpers for the integration suite.

use assert_cmd::Command;
use github_push::core::{ComponentKind, RefSelector};
use github_push::service::NewComponent;
use github_push::test_utils::TestSite;
use std::path::{Path, PathBuf};

/// Tag archive URL served by the fake for `acme/{name}`.
pub fn tag_url(name: &str, tag: &str) -> String {
    format!("https://github.com/acme/{name}/archive/refs/tags/{tag}.zip")
}

/// Registration request for `plugins/{name}/{name}.php` sourced from `acme/{name}`.
pub fn new_plugin(name: &str, ref_selector: RefSelector) -> NewComponent {
    NewComponent {
        id: Some(name.to_string()),
        name: name.to_string(),
        kind: ComponentKind::Plugin,
        repo_url: format!("https://github.com/acme/{name}"),
        ref_selector,
        install_slug: format!("{name}/{name}.php"),
        token: None,
    }
}

/// Plugin main file with a version header.
pub fn plugin_header(name: &str, version: &str) -> String {
    format!("<?php\n/*\n * Plugin Name: {name}\n * Version: {version}\n */\n")
}

/// A temporary site with a config file the binary can be pointed at.
pub struct CliSite {
    pub site: TestSite,
    config_path: PathBuf,
}

impl CliSite {
    pub async fn new() -> Self {
        let site = TestSite::new();
        let config_path = site.root().join("ghpush.toml");
        site.config().save_to(&config_path).await.unwrap();
        Self {
            site,
            config_path,
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// `ghpush --config <site config>` with logging and progress output off.
    pub fn ghpush(&self) -> Command {
        let mut cmd = Command::cargo_bin("ghpush").unwrap();
        cmd.arg("--config")
            .arg(&self.config_path)
            .env_remove("RUST_LOG")
            .env_remove("GHPUSH_CONFIG_PATH")
            .env("GHPUSH_NO_PROGRESS", "1")
            .env("NO_COLOR", "1");
        cmd
    }

    /// Install `plugins/{name}` at `version` and register it without
    /// contacting GitHub.
    pub fn add_plugin(&self, name: &str, version: &str) {
        self.site.install_plugin(name, version);
        self.ghpush()
            .args(["component", "add", "--repo"])
            .arg(format!("https://github.com/acme/{name}"))
            .arg("--slug")
            .arg(format!("{name}/{name}.php"))
            .args(["--id", name, "--tags", "--no-verify"])
            .assert()
            .success();
    }
}
