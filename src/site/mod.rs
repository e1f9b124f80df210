//! The WordPress site being managed: install locations, installed versions
//! and activation state.
//!
//! github-push does not run inside WordPress, so activation is tracked in
//! `activation.json` through the [`ActivationState`] trait. A host that can
//! talk to WordPress directly can supply its own implementation.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::config::GlobalConfig;
use crate::core::{ComponentKind, GhPushError, Registration};
use crate::store::{read_json, write_json};
use crate::version::{UNKNOWN_VERSION, read_header_field};

/// Resolved install location of a component before an update or rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallContext {
    pub kind: ComponentKind,
    /// Directory replaced by a swap
    pub dir: PathBuf,
    /// Whether the component was active before the operation
    pub active: bool,
}

/// Plugins and themes directories of the site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitePaths {
    pub plugins_dir: PathBuf,
    pub themes_dir: PathBuf,
}

fn is_plain_relative(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_)))
}

impl SitePaths {
    pub fn new(plugins_dir: impl Into<PathBuf>, themes_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
            themes_dir: themes_dir.into(),
        }
    }

    /// Paths from the configuration, with `~` and variables expanded.
    pub fn from_config(config: &GlobalConfig) -> Result<Self> {
        Ok(Self::new(config.plugins_dir()?, config.themes_dir()?))
    }

    fn checked_slug(registration: &Registration) -> Result<&str, GhPushError> {
        let slug = registration.install_slug.trim().trim_matches('/');
        if slug.is_empty() {
            return Err(GhPushError::SlugMissing {
                id: registration.id.clone(),
                kind: registration.kind,
            });
        }
        if !is_plain_relative(Path::new(slug)) {
            return Err(GhPushError::InvalidInput {
                message: format!("install slug '{slug}' must be a relative path without '..'"),
            });
        }
        Ok(slug)
    }

    /// Directory that an update replaces.
    ///
    /// Plugins use the directory part of the slug; a single-file plugin has
    /// none and is rejected, since its directory is the plugins directory
    /// itself. Themes use `themes_dir/slug`.
    pub fn install_dir(&self, registration: &Registration) -> Result<PathBuf, GhPushError> {
        let slug = Self::checked_slug(registration)?;
        match registration.kind {
            ComponentKind::Plugin => {
                let (dir, _) = slug.split_once('/').ok_or_else(|| GhPushError::InvalidInput {
                    message: format!(
                        "plugin slug '{slug}' has no directory part; single-file plugins cannot be updated"
                    ),
                })?;
                Ok(self.plugins_dir.join(dir))
            }
            ComponentKind::Theme => {
                if slug.contains('/') {
                    return Err(GhPushError::InvalidInput {
                        message: format!("theme slug '{slug}' must be a directory name"),
                    });
                }
                Ok(self.themes_dir.join(slug))
            }
        }
    }

    /// File whose header carries the installed version.
    pub fn version_file(&self, registration: &Registration) -> Result<PathBuf, GhPushError> {
        let slug = Self::checked_slug(registration)?;
        Ok(match registration.kind {
            ComponentKind::Plugin => self.plugins_dir.join(slug),
            ComponentKind::Theme => self.themes_dir.join(slug).join("style.css"),
        })
    }

    /// Installed version from the file header, or `0.0.0` when unreadable.
    #[must_use]
    pub fn installed_version(&self, registration: &Registration) -> String {
        let Ok(path) = self.version_file(registration) else {
            return UNKNOWN_VERSION.to_string();
        };
        match std::fs::read(&path) {
            Ok(bytes) => read_header_field(&String::from_utf8_lossy(&bytes), "Version")
                .unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
            Err(e) => {
                debug!("Installed version unreadable at {}: {e}", path.display());
                UNKNOWN_VERSION.to_string()
            }
        }
    }

    /// Install directory plus the current activation flag.
    pub fn resolve_context(
        &self,
        registration: &Registration,
        activation: &dyn ActivationState,
    ) -> Result<InstallContext> {
        let dir = self.install_dir(registration)?;
        let active = activation.is_active(registration)?;
        Ok(InstallContext {
            kind: registration.kind,
            dir,
            active,
        })
    }
}

/// Whether plugins and themes are active, and switching them back on.
pub trait ActivationState: Send + Sync {
    fn is_active(&self, registration: &Registration) -> Result<bool>;

    fn activate(&self, registration: &Registration) -> Result<()>;

    fn deactivate(&self, registration: &Registration) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ActivationDocument {
    #[serde(default)]
    active_plugins: BTreeSet<String>,
    #[serde(default)]
    active_theme: Option<String>,
}

/// Activation state kept in `activation.json`.
///
/// Plugins are identified by install slug, the theme by directory name.
#[derive(Debug)]
pub struct FileActivation {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileActivation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn modify(&self, change: impl FnOnce(&mut ActivationDocument)) -> Result<()> {
        let _guard =
            self.write_lock.lock().map_err(|_| anyhow::anyhow!("activation lock poisoned"))?;
        let mut doc: ActivationDocument = read_json(&self.path)?;
        change(&mut doc);
        write_json(&self.path, &doc)
    }
}

impl ActivationState for FileActivation {
    fn is_active(&self, registration: &Registration) -> Result<bool> {
        let doc: ActivationDocument = read_json(&self.path)?;
        Ok(match registration.kind {
            ComponentKind::Plugin => doc.active_plugins.contains(&registration.install_slug),
            ComponentKind::Theme => {
                doc.active_theme.as_deref() == Some(registration.install_slug.as_str())
            }
        })
    }

    fn activate(&self, registration: &Registration) -> Result<()> {
        let slug = registration.install_slug.clone();
        self.modify(|doc| match registration.kind {
            ComponentKind::Plugin => {
                doc.active_plugins.insert(slug);
            }
            ComponentKind::Theme => doc.active_theme = Some(slug),
        })
    }

    fn deactivate(&self, registration: &Registration) -> Result<()> {
        let slug = registration.install_slug.as_str();
        self.modify(|doc| match registration.kind {
            ComponentKind::Plugin => {
                doc.active_plugins.remove(slug);
            }
            ComponentKind::Theme => {
                if doc.active_theme.as_deref() == Some(slug) {
                    doc.active_theme = None;
                }
            }
        })
    }
}
