//! Temporary WordPress sites.

use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::config::GlobalConfig;
use crate::core::{ComponentKind, RefSelector, Registration};
use crate::github::RepoRef;
use crate::notify::{Notice, NoticeKind, Notifier};
use crate::service::GitHubPush;
use crate::site::{FileActivation, SitePaths};

/// Notifier that keeps every notice in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    /// Kinds of the received notices, oldest first.
    pub fn kinds(&self) -> Vec<NoticeKind> {
        self.notices().into_iter().map(|n| n.kind).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

/// A site rooted in a temporary directory.
///
/// Layout follows [`GlobalConfig::for_site_root`]: `wp-content/plugins`,
/// `wp-content/themes` and `.ghpush` for data. Nothing is created until a
/// component is installed or an operation writes data.
pub struct TestSite {
    temp: TempDir,
    config: GlobalConfig,
}

impl Default for TestSite {
    fn default() -> Self {
        Self::new()
    }
}

impl TestSite {
    #[must_use]
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let config = GlobalConfig::for_site_root(temp.path());
        Self {
            temp,
            config,
        }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Configuration pointing at this site.
    pub fn config(&self) -> GlobalConfig {
        self.config.clone()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.config.data_dir.clone()
    }

    pub fn paths(&self) -> SitePaths {
        SitePaths::new(&self.config.plugins_dir, &self.config.themes_dir)
    }

    pub fn plugin_dir(&self, name: &str) -> PathBuf {
        self.config.plugins_dir.join(name)
    }

    pub fn theme_dir(&self, name: &str) -> PathBuf {
        self.config.themes_dir.join(name)
    }

    /// Write `plugins/{name}/{name}.php` with a plugin header.
    pub fn install_plugin(&self, name: &str, version: &str) {
        self.write_plugin_file(
            name,
            &format!("{name}.php"),
            &format!("<?php\n/*\n * Plugin Name: {name}\n * Version: {version}\n */\n"),
        );
    }

    /// Write `themes/{name}/style.css` with a theme header.
    pub fn install_theme(&self, name: &str, version: &str) {
        let dir = self.theme_dir(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("style.css"),
            format!("/*\nTheme Name: {name}\nVersion: {version}\n*/\n"),
        )
        .unwrap();
    }

    pub fn write_plugin_file(&self, name: &str, relative: &str, contents: &str) {
        let path = self.plugin_dir(name).join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    /// Registration for a plugin installed with [`Self::install_plugin`],
    /// sourced from `github.com/acme/{name}`.
    pub fn plugin_registration(&self, name: &str, ref_selector: RefSelector) -> Registration {
        registration(name, ComponentKind::Plugin, format!("{name}/{name}.php"), ref_selector)
    }

    /// Registration for a theme installed with [`Self::install_theme`].
    pub fn theme_registration(&self, name: &str, ref_selector: RefSelector) -> Registration {
        registration(name, ComponentKind::Theme, name.to_string(), ref_selector)
    }

    /// Activation state stored in this site's data directory.
    pub fn activation(&self) -> Arc<FileActivation> {
        Arc::new(FileActivation::new(self.config.data_dir.join("activation.json")))
    }

    /// Relative path to contents of every file in a plugin directory.
    pub fn snapshot_tree(&self, name: &str) -> BTreeMap<String, Vec<u8>> {
        let dir = self.plugin_dir(name);
        WalkDir::new(&dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let relative = e.path().strip_prefix(&dir).unwrap().to_string_lossy().replace('\\', "/");
                (relative, std::fs::read(e.path()).unwrap())
            })
            .collect()
    }

    /// Facade for this site talking to `github`.
    pub fn push(&self, github: Arc<crate::test_utils::FakeGitHub>) -> GitHubPush {
        GitHubPush::builder(self.config()).github(github).build().unwrap()
    }

    /// Like [`Self::push`], with notices sent to `notifier`.
    pub fn push_with(
        &self,
        github: Arc<crate::test_utils::FakeGitHub>,
        notifier: Arc<RecordingNotifier>,
    ) -> GitHubPush {
        GitHubPush::builder(self.config()).github(github).notifier(notifier).build().unwrap()
    }
}

fn registration(
    name: &str,
    kind: ComponentKind,
    install_slug: String,
    ref_selector: RefSelector,
) -> Registration {
    let now = Utc::now();
    Registration {
        id: name.to_string(),
        name: name.to_string(),
        kind,
        repo_url: format!("https://github.com/acme/{name}"),
        repository: RepoRef::new("acme", name),
        ref_selector,
        install_slug,
        token: None,
        created_at: now,
        updated_at: now,
    }
}
