//! `ghpush logs` and `ghpush notices`.

use anyhow::Result;
use clap::Args;
use colored::{ColoredString, Colorize};

use super::{CliContext, print_json};
use crate::notify::NoticeLevel;
use crate::store::LogStatus;

#[derive(Args)]
pub struct LogsCommand {
    /// Only entries of this component
    #[arg(long, value_name = "ID")]
    component: Option<String>,

    /// Maximum number of entries
    #[arg(long, default_value_t = 20)]
    limit: usize,

    /// Entries to skip, newest first
    #[arg(long, default_value_t = 0)]
    offset: usize,

    /// Print JSON
    #[arg(long)]
    json: bool,
}

fn status_label(status: LogStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        LogStatus::Success => label.green(),
        LogStatus::Error => label.red(),
        LogStatus::Warning => label.yellow(),
        LogStatus::Info => label.normal(),
    }
}

impl LogsCommand {
    pub async fn execute(self, ctx: &CliContext) -> Result<()> {
        let push = ctx.push().await?;
        let component = self.component.as_deref();
        let entries = push.get_logs(component, self.limit, self.offset)?;

        if self.json {
            return print_json(&entries);
        }
        if entries.is_empty() {
            println!("No log entries.");
            return Ok(());
        }

        for entry in &entries {
            println!(
                "#{:<5} {} {:<14} {:<13} {:<8} {}{}",
                entry.id,
                entry.created_at.format("%Y-%m-%d %H:%M:%S"),
                entry.component_id,
                entry.action.to_string(),
                status_label(entry.status),
                entry.message,
                entry.version.as_deref().map(|v| format!(" [{v}]")).unwrap_or_default()
            );
        }

        let total = push.get_log_count(component)?;
        let shown_until = self.offset + entries.len();
        if shown_until < total {
            println!("\n{} of {total} entries shown; use --offset {shown_until} for more", entries.len());
        }
        Ok(())
    }
}

#[derive(Args)]
pub struct NoticesCommand {
    /// Delete the notice history
    #[arg(long)]
    clear: bool,

    /// Print JSON
    #[arg(long)]
    json: bool,
}

impl NoticesCommand {
    pub async fn execute(self, ctx: &CliContext) -> Result<()> {
        let push = ctx.push().await?;
        if self.clear {
            push.clear_notices()?;
            println!("✅ Notices cleared");
            return Ok(());
        }

        let notices = push.notices()?;
        if self.json {
            return print_json(&notices);
        }
        if notices.is_empty() {
            println!("No notices.");
            return Ok(());
        }
        for notice in &notices {
            let level = notice.level.to_string();
            let level = match notice.level {
                NoticeLevel::Success => level.green(),
                NoticeLevel::Info => level.blue(),
                NoticeLevel::Error => level.red(),
            };
            println!(
                "{} {:<7} {}",
                notice.created_at.format("%Y-%m-%d %H:%M:%S"),
                level,
                notice.message
            );
        }
        Ok(())
    }
}
