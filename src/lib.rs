//! github-push - keep WordPress plugins and themes in sync with GitHub
//!
//! Register a GitHub repository as the update source for an installed plugin
//! or theme, check it for new versions (release tags or a branch head), and
//! apply updates by downloading, extracting and swapping in the new code.
//! Every update is preceded by a zip backup; the newest backups are retained
//! so that any update can be rolled back.
//!
//! # Architecture Overview
//!
//! The update pipeline, leaf first:
//! - [`github`] - URL parsing, the [`github::GitHubApi`] seam and its reqwest
//!   client, and the version-file locator
//! - [`version`] - version header extraction and dotted version comparison
//! - [`resolver`] - update decisions with a short-lived on-disk cache
//! - [`archive`] - streaming archive downloads
//! - [`backup`] - bounded zip snapshots of installed components
//! - [`apply`] - extract, swap, reactivate, and rollback
//!
//! Around it:
//! - [`service`] - the [`service::GitHubPush`] facade used by the CLI
//! - [`store`] - registrations, backup snapshots and the audit log
//! - [`site`] - install locations, installed versions and activation state
//! - [`notify`] - operator notices
//! - [`lock`] - per-component exclusive locks
//! - [`config`] - global configuration (`~/.ghpush/config.toml`)
//! - [`cli`] - command-line interface
//!
//! # Example
//!
//! ```rust,no_run
//! use github_push::config::GlobalConfig;
//! use github_push::service::GitHubPush;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = GlobalConfig::load().await?;
//! let push = GitHubPush::from_config(config)?;
//!
//! let decision = push.check_for_updates("my-plugin-1714564800", false).await?;
//! if decision.update_available {
//!     let outcome = push.update_plugin("my-plugin-1714564800").await?;
//!     println!("{}", outcome.message());
//! }
//! # Ok(())
//! # }
//! ```

pub mod apply;
pub mod archive;
pub mod backup;
pub mod cli;
pub mod config;
pub mod core;
pub mod github;
pub mod lock;
pub mod notify;
pub mod resolver;
pub mod service;
pub mod site;
pub mod store;
pub mod utils;
pub mod version;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
