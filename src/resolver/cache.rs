//! On-disk cache of update decisions, one file per component.
//!
//! Entries live in `<data_dir>/cache/{id}.json` and are trusted for
//! `cache_ttl` seconds after `checked_at`. Unreadable entries count as
//! misses. Concurrent writers simply overwrite each other.

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::PathBuf;
use tracing::debug;

use super::UpdateDecision;
use crate::store::write_json;

/// Directory of cached [`UpdateDecision`]s.
#[derive(Debug, Clone)]
pub struct DecisionCache {
    dir: PathBuf,
}

impl DecisionCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
        }
    }

    fn entry_path(&self, component_id: &str) -> PathBuf {
        self.dir.join(format!("{component_id}.json"))
    }

    /// Cached decision younger than `ttl_seconds`, if any.
    #[must_use]
    pub fn get(&self, component_id: &str, ttl_seconds: u64) -> Option<UpdateDecision> {
        let path = self.entry_path(component_id);
        let content = std::fs::read_to_string(&path).ok()?;
        let decision: UpdateDecision = match serde_json::from_str(&content) {
            Ok(decision) => decision,
            Err(e) => {
                debug!("Ignoring unreadable cache entry {}: {e}", path.display());
                return None;
            }
        };
        decision.is_valid(ttl_seconds, Utc::now()).then_some(decision)
    }

    pub fn put(&self, component_id: &str, decision: &UpdateDecision) -> Result<()> {
        write_json(&self.entry_path(component_id), decision)
    }

    /// Drop the entry for a component. Missing entries are fine.
    pub fn invalidate(&self, component_id: &str) -> Result<()> {
        let path = self.entry_path(component_id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}
