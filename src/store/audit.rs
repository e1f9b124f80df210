//! Append-only audit log of checks, updates, backups and rollbacks.
//!
//! One JSON object per line in `audit.jsonl`. Entries are never rewritten or
//! deleted, including when their component is removed.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use tracing::warn;

use crate::utils::ensure_dir;

/// Bytes read from the end of the log to find the last entry id.
const TAIL_WINDOW: u64 = 16 * 1024;

/// Operation an entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogAction {
    VersionCheck,
    Update,
    Rollback,
    Backup,
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::VersionCheck => "version_check",
            Self::Update => "update",
            Self::Rollback => "rollback",
            Self::Backup => "backup",
        })
    }
}

/// Outcome of the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Error,
    Info,
    Warning,
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Info => "info",
            Self::Warning => "warning",
        })
    }
}

/// One audit log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonic sequence number, starting at 1
    pub id: u64,
    pub component_id: String,
    pub action: LogAction,
    pub status: LogStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// `audit.jsonl` accessor.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    /// Every readable entry in insertion order. Malformed lines are skipped.
    fn entries(&self) -> Result<Vec<LogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read audit log {}", self.path.display()))?;

        let mut entries = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LogEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Skipping malformed audit log line {}: {e}", line_no + 1),
            }
        }
        Ok(entries)
    }

    /// Id of the newest readable entry, or 0 for an empty log.
    ///
    /// Only the tail of the file is parsed; a full scan happens when the tail
    /// holds no readable entry.
    fn last_id(&self) -> Result<u64> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to open audit log {}", self.path.display()));
            }
        };
        let len = file.metadata()?.len();
        let start = len.saturating_sub(TAIL_WINDOW);
        file.seek(SeekFrom::Start(start))?;
        let mut tail = Vec::new();
        file.read_to_end(&mut tail)
            .with_context(|| format!("Failed to read audit log {}", self.path.display()))?;

        let tail = String::from_utf8_lossy(&tail);
        let mut lines = tail.lines().rev().collect::<Vec<_>>();
        // The first line of a partial window may be cut mid-entry
        if start > 0 {
            lines.pop();
        }
        let found = lines.into_iter().find_map(|line| serde_json::from_str::<LogEntry>(line).ok());
        match found {
            Some(entry) => Ok(entry.id),
            None if start > 0 => Ok(self.entries()?.iter().map(|e| e.id).max().unwrap_or(0)),
            None => Ok(0),
        }
    }

    /// Append an entry stamped with the current time.
    pub fn append(
        &self,
        component_id: &str,
        action: LogAction,
        status: LogStatus,
        message: impl Into<String>,
        version: Option<&str>,
    ) -> Result<LogEntry> {
        self.append_at(component_id, action, status, message, version, Utc::now())
    }

    /// Append an entry with an explicit timestamp.
    pub fn append_at(
        &self,
        component_id: &str,
        action: LogAction,
        status: LogStatus,
        message: impl Into<String>,
        version: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Result<LogEntry> {
        let next_id = self.last_id()? + 1;
        let entry = LogEntry {
            id: next_id,
            component_id: component_id.to_string(),
            action,
            status,
            message: message.into(),
            version: version.map(str::to_string),
            created_at,
        };

        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }
        let mut line = serde_json::to_string(&entry).context("Failed to serialize audit entry")?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open audit log {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("Failed to append to audit log {}", self.path.display()))?;

        Ok(entry)
    }

    /// Newest first, optionally for one component, paginated.
    ///
    /// Entries with the same timestamp are ordered by insertion, later first.
    pub fn get_logs(
        &self,
        component_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LogEntry>> {
        let mut entries: Vec<LogEntry> = self
            .entries()?
            .into_iter()
            .filter(|e| component_id.is_none_or(|id| e.component_id == id))
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(entries.into_iter().skip(offset).take(limit).collect())
    }

    /// Entry with the given sequence number.
    pub fn get_entry(&self, id: u64) -> Result<Option<LogEntry>> {
        Ok(self.entries()?.into_iter().find(|e| e.id == id))
    }

    /// Number of entries, optionally for one component.
    pub fn get_log_count(&self, component_id: Option<&str>) -> Result<usize> {
        Ok(self
            .entries()?
            .iter()
            .filter(|e| component_id.is_none_or(|id| e.component_id == id))
            .count())
    }
}
