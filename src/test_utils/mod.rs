//! Test utilities for github-push
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration suite.
//!
//! - [`FakeGitHub`] - in-memory repositories, tags, branches, contents and
//!   archives behind the [`crate::github::GitHubApi`] trait, with a request log
//! - [`TestSite`] - a temporary WordPress tree plus a matching configuration
//!   and facade
//! - [`RecordingNotifier`] - collects notices instead of storing them
//! - zip helpers for building archives in tests
//!
//! # Example
//!
//! ```rust,no_run
//! use github_push::core::RefSelector;
//! use github_push::test_utils::{FakeGitHub, TestSite};
//! use std::sync::Arc;
//!
//! let site = TestSite::new();
//! site.install_plugin("shop", "1.0.0");
//! let fake = Arc::new(FakeGitHub::new());
//! fake.set_tags("acme", "shop", &["v1.1.0"]);
//! let push = site.push(fake);
//! ```

pub mod fixtures;
pub mod github;
pub mod site;

pub use fixtures::{write_zip, zip_bytes, zip_entry_names};
pub use github::FakeGitHub;
pub use site::{RecordingNotifier, TestSite};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests, once per process.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, tests run
/// without a subscriber.
///
/// ```bash
/// RUST_LOG=github_push=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
