//! `ghpush rollback` - restore a backup.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::{CliContext, print_json};
use crate::core::GhPushError;
use crate::utils::Spinner;

#[derive(Args)]
pub struct RollbackCommand {
    /// Component id
    id: String,

    /// Backup archive to restore; defaults to the newest one
    #[arg(long, value_name = "PATH", conflicts_with = "log_entry")]
    backup: Option<PathBuf>,

    /// Restore the backup taken before this audit log entry
    #[arg(long, value_name = "ID")]
    log_entry: Option<u64>,

    /// Version label recorded in the audit log
    #[arg(long, value_name = "LABEL")]
    version: Option<String>,

    /// Print JSON
    #[arg(long)]
    json: bool,
}

impl RollbackCommand {
    pub async fn execute(self, ctx: &CliContext) -> Result<()> {
        let push = ctx.push().await?;

        let mut backup = self.backup;
        let mut label = self.version;
        if let Some(log_id) = self.log_entry {
            let snapshot = push.backup_for_log_entry(log_id)?.ok_or_else(|| GhPushError::NoBackup {
                id: self.id.clone(),
            })?;
            if snapshot.component_id != self.id {
                return Err(GhPushError::InvalidInput {
                    message: format!(
                        "audit entry {log_id} belongs to '{}', not '{}'",
                        snapshot.component_id, self.id
                    ),
                }
                .into());
            }
            label.get_or_insert_with(|| snapshot.version.clone());
            backup = Some(snapshot.path);
        }

        let spinner = Spinner::start(format!("Rolling back {}", self.id), ctx.quiet || self.json);
        let outcome = push.rollback(&self.id, backup.as_deref(), label.as_deref()).await;
        spinner.finish();
        let outcome = outcome?;

        if self.json {
            return print_json(&outcome);
        }
        println!("✅ {}: {}", self.id.bold(), outcome.message);
        println!("   from {}", outcome.backup_path.display());
        Ok(())
    }
}
