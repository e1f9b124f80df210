//! Command-line interface for github-push.
//!
//! # Commands
//!
//! ## Components
//! - `component add|list|show|remove|activate|deactivate` - manage registrations
//!
//! ## Updates
//! - `check <id>` / `check --all` - look for new versions
//! - `update <id>` - back up, download and install the latest version
//! - `rollback <id>` - restore a backup
//! - `backups <id>` - list retained backups
//!
//! ## Information
//! - `logs` - audit log
//! - `notices` - operator notices
//! - `repo-info <url>` - repository metadata
//! - `version <id>` - installed version
//!
//! ## Configuration
//! - `config init|show|path`
//!
//! # Example
//!
//! ```bash
//! ghpush config init
//! ghpush component add --repo https://github.com/acme/shop --slug shop/shop.php --tags
//! ghpush check --all
//! ghpush update shop-1714564800
//! ghpush rollback shop-1714564800
//! ```
//!
//! # Global Options
//!
//! - `--verbose` - debug logging
//! - `--quiet` - no logging, no spinners
//! - `--config` - path to the configuration file

mod backups;
mod check;
mod component;
mod config;
mod logs;
mod repo;
mod rollback;
mod update;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::GlobalConfig;
use crate::service::GitHubPush;

/// Settings shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct CliContext {
    /// `--config`, overriding the default location
    pub config_path: Option<PathBuf>,
    /// `--quiet`
    pub quiet: bool,
}

impl CliContext {
    /// Configuration file location in effect.
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => GlobalConfig::default_path(),
        }
    }

    pub async fn load_config(&self) -> Result<GlobalConfig> {
        GlobalConfig::load_with_optional(self.config_path.clone()).await
    }

    /// Facade built from the configuration.
    pub async fn push(&self) -> Result<GitHubPush> {
        GitHubPush::from_config(self.load_config().await?)
    }
}

#[derive(Parser)]
#[command(
    name = "ghpush",
    about = "Keep WordPress plugins and themes in sync with GitHub",
    version,
    long_about = "ghpush checks GitHub release tags or branch heads for new versions of registered \
                  WordPress plugins and themes, installs them with a backup first, and rolls \
                  them back on request."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress logging and progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register, list and remove tracked components
    Component(component::ComponentCommand),

    /// Check for updates
    Check(check::CheckCommand),

    /// Install the latest version of a component
    Update(update::UpdateCommand),

    /// Restore a component from a backup
    Rollback(rollback::RollbackCommand),

    /// List retained backups of a component
    Backups(backups::BackupsCommand),

    /// Show the audit log
    Logs(logs::LogsCommand),

    /// Show or clear operator notices
    Notices(logs::NoticesCommand),

    /// Show metadata of a GitHub repository
    RepoInfo(repo::RepoInfoCommand),

    /// Print the installed version of a component
    Version(repo::VersionCommand),

    /// Manage the configuration file
    Config(config::ConfigCommand),
}

impl Cli {
    /// Log filter selected by `--verbose` / `--quiet`.
    #[must_use]
    pub fn log_level(&self) -> Option<String> {
        if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            Some("off".to_string())
        } else {
            None
        }
    }

    #[must_use]
    pub fn context(&self) -> CliContext {
        CliContext {
            config_path: self.config.clone(),
            quiet: self.quiet,
        }
    }

    pub async fn execute(self) -> Result<()> {
        let ctx = self.context();
        match self.command {
            Commands::Component(cmd) => cmd.execute(&ctx).await,
            Commands::Check(cmd) => cmd.execute(&ctx).await,
            Commands::Update(cmd) => cmd.execute(&ctx).await,
            Commands::Rollback(cmd) => cmd.execute(&ctx).await,
            Commands::Backups(cmd) => cmd.execute(&ctx).await,
            Commands::Logs(cmd) => cmd.execute(&ctx).await,
            Commands::Notices(cmd) => cmd.execute(&ctx).await,
            Commands::RepoInfo(cmd) => cmd.execute(&ctx).await,
            Commands::Version(cmd) => cmd.execute(&ctx).await,
            Commands::Config(cmd) => cmd.execute(&ctx).await,
        }
    }
}

/// Install the tracing subscriber on stderr.
///
/// `RUST_LOG` wins over `level`; with neither, only warnings are shown.
pub fn init_logging(level: Option<&str>) {
    let filter = match (std::env::var("RUST_LOG"), level) {
        (Ok(_), _) => EnvFilter::from_default_env(),
        (Err(_), Some(level)) => EnvFilter::new(level),
        (Err(_), None) => EnvFilter::new("warn"),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Print `value` as pretty JSON.
fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
