//! Global configuration for github-push.
//!
//! The configuration lives at `~/.ghpush/config.toml` (or
//! `%LOCALAPPDATA%\ghpush\config.toml` on Windows). `GHPUSH_CONFIG_PATH`
//! overrides the location. A missing file means "all defaults".
//!
//! # Example
//!
//! ```toml
//! plugins_dir = "/var/www/html/wp-content/plugins"
//! themes_dir = "/var/www/html/wp-content/themes"
//! data_dir = "~/.ghpush/data"
//! cache_ttl = 900
//! max_backups = 5
//! tag_order = "api"
//! auto_update = false
//! ```
//!
//! Access tokens are stored on registrations, not here, but the data and
//! config files are still written with owner-only permissions on Unix.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "GHPUSH_CONFIG_PATH";

fn default_plugins_dir() -> PathBuf {
    PathBuf::from("./wp-content/plugins")
}

fn default_themes_dir() -> PathBuf {
    PathBuf::from("./wp-content/themes")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.ghpush/data")
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_archive_base() -> String {
    "https://github.com".to_string()
}

const fn default_cache_ttl() -> u64 {
    15 * 60
}

const fn default_api_timeout() -> u64 {
    30
}

const fn default_download_timeout() -> u64 {
    300
}

const fn default_max_backups() -> usize {
    5
}

const fn default_max_notices() -> usize {
    50
}

/// How the latest tag is chosen from the GitHub tag list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagOrder {
    /// First tag returned by the API
    #[default]
    Api,
    /// Highest version among the returned tags
    Semver,
}

/// Global settings shared by every command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// WordPress plugins directory
    #[serde(default = "default_plugins_dir")]
    pub plugins_dir: PathBuf,

    /// WordPress themes directory
    #[serde(default = "default_themes_dir")]
    pub themes_dir: PathBuf,

    /// Registrations, backups, audit log, cache, scratch space and locks
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// GitHub REST API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Base URL for `/{owner}/{repo}/archive/...` downloads
    #[serde(default = "default_archive_base")]
    pub archive_base: String,

    /// Seconds an update decision stays cached
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: u64,

    /// Timeout for API calls, in seconds
    #[serde(default = "default_api_timeout")]
    pub api_timeout: u64,

    /// Timeout for archive downloads, in seconds
    #[serde(default = "default_download_timeout")]
    pub download_timeout: u64,

    /// Backups retained per component
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,

    /// Latest-tag selection policy
    #[serde(default)]
    pub tag_order: TagOrder,

    /// Apply available updates during `check --all`
    #[serde(default)]
    pub auto_update: bool,

    /// Operator notices retained in the notice history
    #[serde(default = "default_max_notices")]
    pub max_notices: usize,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            plugins_dir: default_plugins_dir(),
            themes_dir: default_themes_dir(),
            data_dir: default_data_dir(),
            api_base: default_api_base(),
            archive_base: default_archive_base(),
            cache_ttl: default_cache_ttl(),
            api_timeout: default_api_timeout(),
            download_timeout: default_download_timeout(),
            max_backups: default_max_backups(),
            tag_order: TagOrder::default(),
            auto_update: false,
            max_notices: default_max_notices(),
        }
    }
}

impl GlobalConfig {
    /// Load from the default location, falling back to defaults.
    pub async fn load() -> Result<Self> {
        Self::load_with_optional(None).await
    }

    /// Load from `path` when given, else from the default location.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        if path.exists() {
            Self::load_from(&path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read global config from {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .map_err(crate::core::GhPushError::from)
            .with_context(|| format!("Failed to parse global config from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write to `path`, creating parent directories.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize global config")?;

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write global config to {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut perms = fs::metadata(path)
                .await
                .with_context(|| format!("Failed to read permissions for {}", path.display()))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms).await.with_context(|| {
                format!("Failed to set secure permissions on {}", path.display())
            })?;
        }

        Ok(())
    }

    /// Config file location, honoring `GHPUSH_CONFIG_PATH`.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV)
            && !path.is_empty()
        {
            return Ok(PathBuf::from(path));
        }

        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("ghpush")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".ghpush")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Reject values that would make the pipeline misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.max_backups == 0 {
            return Err(crate::core::GhPushError::ConfigError {
                message: "max_backups must be at least 1".to_string(),
            }
            .into());
        }
        if self.api_timeout == 0 || self.download_timeout == 0 {
            return Err(crate::core::GhPushError::ConfigError {
                message: "timeouts must be greater than zero".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Plugins directory with `~` and environment variables expanded.
    pub fn plugins_dir(&self) -> Result<PathBuf> {
        expand_path(&self.plugins_dir)
    }

    /// Themes directory with `~` and environment variables expanded.
    pub fn themes_dir(&self) -> Result<PathBuf> {
        expand_path(&self.themes_dir)
    }

    /// Data directory with `~` and environment variables expanded.
    pub fn data_dir(&self) -> Result<PathBuf> {
        expand_path(&self.data_dir)
    }

    /// API timeout as a [`Duration`].
    #[must_use]
    pub const fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout)
    }

    /// Download timeout as a [`Duration`].
    #[must_use]
    pub const fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout)
    }

    /// Configuration rooted in one directory. Used by tests and `config init`.
    #[must_use]
    pub fn for_site_root(root: &Path) -> Self {
        Self {
            plugins_dir: root.join("wp-content").join("plugins"),
            themes_dir: root.join("wp-content").join("themes"),
            data_dir: root.join(".ghpush"),
            ..Self::default()
        }
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw)
        .with_context(|| format!("Failed to expand path: {}", path.display()))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = GlobalConfig::default();
        assert_eq!(config.cache_ttl, 900);
        assert_eq!(config.api_timeout, 30);
        assert_eq!(config.download_timeout, 300);
        assert_eq!(config.max_backups, 5);
        assert_eq!(config.tag_order, TagOrder::Api);
        assert!(!config.auto_update);
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let mut config = GlobalConfig::for_site_root(temp.path());
        config.tag_order = TagOrder::Semver;
        config.max_backups = 3;
        config.save_to(&path).await.unwrap();

        let loaded = GlobalConfig::load_from(&path).await.unwrap();
        assert_eq!(loaded.tag_order, TagOrder::Semver);
        assert_eq!(loaded.max_backups, 3);
        assert_eq!(loaded.plugins_dir, temp.path().join("wp-content").join("plugins"));
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        tokio::fs::write(&path, "auto_update = true\n").await.unwrap();

        let loaded = GlobalConfig::load_from(&path).await.unwrap();
        assert!(loaded.auto_update);
        assert_eq!(loaded.cache_ttl, 900);
        assert_eq!(loaded.api_base, "https://api.github.com");
    }

    #[tokio::test]
    async fn test_invalid_values_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        tokio::fs::write(&path, "max_backups = 0\n").await.unwrap();

        let err = GlobalConfig::load_from(&path).await.unwrap_err();
        assert!(err.to_string().contains("max_backups"));
    }

    #[tokio::test]
    async fn test_malformed_toml_is_config_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        tokio::fs::write(&path, "cache_ttl = [").await.unwrap();

        let err = GlobalConfig::load_from(&path).await.unwrap_err();
        let push_err = err.downcast_ref::<crate::core::GhPushError>().unwrap();
        assert_eq!(push_err.kind(), crate::core::ErrorKind::Config);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");
        GlobalConfig::default().save_to(&path).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    #[serial]
    fn test_env_override_path() {
        let temp = TempDir::new().unwrap();
        let custom = temp.path().join("custom.toml");
        unsafe {
            std::env::set_var(CONFIG_PATH_ENV, &custom);
        }
        let path = GlobalConfig::default_path().unwrap();
        unsafe {
            std::env::remove_var(CONFIG_PATH_ENV);
        }
        assert_eq!(path, custom);
    }

    #[test]
    fn test_tilde_expansion() {
        let config = GlobalConfig::default();
        let data_dir = config.data_dir().unwrap();
        assert!(!data_dir.to_string_lossy().starts_with('~'));
        assert!(data_dir.ends_with(".ghpush/data"));
    }
}
