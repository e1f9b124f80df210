//! Integration test suite for github-push
//!
//! End-to-end tests of the update pipeline through the [`GitHubPush`] facade
//! with an in-memory GitHub, and of the `ghpush` binary against temporary
//! WordPress sites. No test touches the network.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **scenarios**: version checks and backups against fixed repository states
//! - **update_flow**: update, failure handling and concurrency
//! - **rollback_flow**: restoring backups and audit log lookups
//! - **cli**: the `ghpush` binary
//!
//! [`GitHubPush`]: github_push::service::GitHubPush

mod common;

mod cli;
mod rollback_flow;
mod scenarios;
mod update_flow;
