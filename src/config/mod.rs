//! Configuration for github-push.
//!
//! A single global TOML file, see [`GlobalConfig`]. Command-line flags only
//! choose which file is read; there is no per-project configuration.

mod global;

pub use global::{CONFIG_PATH_ENV, GlobalConfig, TagOrder};
