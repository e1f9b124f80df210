//! Operator notices.
//!
//! The pipeline reports user-facing outcomes (updated, rolled back, update
//! available, failed) through the [`Notifier`] trait. [`NoticeStore`] keeps a
//! bounded history in `notices.json` and mirrors each notice to tracing; the
//! CLI shows the history with `ghpush notices`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, info};

use crate::store::{read_json, write_json};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Updated,
    RolledBack,
    UpdateAvailable,
    Error,
}

/// Severity, used for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Error => "error",
        })
    }
}

/// A message for the site operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub component_id: String,
    pub kind: NoticeKind,
    pub level: NoticeLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notice {
    /// Build a notice stamped now. The level follows from the kind.
    pub fn new(component_id: &str, kind: NoticeKind, message: impl Into<String>) -> Self {
        let level = match kind {
            NoticeKind::Updated | NoticeKind::RolledBack => NoticeLevel::Success,
            NoticeKind::UpdateAvailable => NoticeLevel::Info,
            NoticeKind::Error => NoticeLevel::Error,
        };
        Self {
            component_id: component_id.to_string(),
            kind,
            level,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

/// Receives operator notices.
///
/// Delivery failures must not fail the operation that raised the notice, so
/// implementations swallow and log their own errors.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// File-backed notice history.
#[derive(Debug)]
pub struct NoticeStore {
    path: PathBuf,
    max_notices: usize,
    write_lock: Mutex<()>,
}

impl NoticeStore {
    pub fn new(path: impl Into<PathBuf>, max_notices: usize) -> Self {
        Self {
            path: path.into(),
            max_notices: max_notices.max(1),
            write_lock: Mutex::new(()),
        }
    }

    /// Stored notices, newest first.
    pub fn list(&self) -> Result<Vec<Notice>> {
        let mut notices: Vec<Notice> = read_json(&self.path)?;
        notices.reverse();
        Ok(notices)
    }

    pub fn clear(&self) -> Result<()> {
        write_json(&self.path, &Vec::<Notice>::new())
    }

    fn push(&self, notice: Notice) -> Result<()> {
        let _guard = self.write_lock.lock().map_err(|_| anyhow::anyhow!("notice lock poisoned"))?;
        let mut notices: Vec<Notice> = read_json(&self.path)?;
        notices.push(notice);
        if notices.len() > self.max_notices {
            let excess = notices.len() - self.max_notices;
            notices.drain(..excess);
        }
        write_json(&self.path, &notices)
    }
}

impl Notifier for NoticeStore {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => error!("[{}] {}", notice.component_id, notice.message),
            _ => info!("[{}] {}", notice.component_id, notice.message),
        }
        if let Err(e) = self.push(notice) {
            error!("Failed to record notice: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_level_follows_kind() {
        assert_eq!(Notice::new("a", NoticeKind::Updated, "x").level, NoticeLevel::Success);
        assert_eq!(Notice::new("a", NoticeKind::UpdateAvailable, "x").level, NoticeLevel::Info);
        assert_eq!(Notice::new("a", NoticeKind::Error, "x").level, NoticeLevel::Error);
    }

    #[test]
    fn test_history_is_bounded_and_newest_first() {
        let temp = TempDir::new().unwrap();
        let store = NoticeStore::new(temp.path().join("notices.json"), 3);
        for i in 0..5 {
            store.notify(Notice::new("shop", NoticeKind::Updated, format!("n{i}")));
        }
        let messages: Vec<String> = store.list().unwrap().into_iter().map(|n| n.message).collect();
        assert_eq!(messages, vec!["n4", "n3", "n2"]);

        store.clear().unwrap();
        assert!(store.list().unwrap().is_empty());
    }
}
