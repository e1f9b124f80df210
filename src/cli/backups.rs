//! `ghpush backups` - list retained backups.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::{CliContext, print_json};

#[derive(Args)]
pub struct BackupsCommand {
    /// Component id
    id: String,

    /// Print JSON
    #[arg(long)]
    json: bool,
}

impl BackupsCommand {
    pub async fn execute(self, ctx: &CliContext) -> Result<()> {
        let push = ctx.push().await?;
        let backups = push.list_backups(&self.id)?;

        if self.json {
            return print_json(&backups);
        }
        if backups.is_empty() {
            println!("No backups for '{}'.", self.id);
            return Ok(());
        }

        println!("{}", format!("Backups of {} (newest first)", self.id).bold());
        for snapshot in &backups {
            let state = if snapshot.exists() { "".normal() } else { " (file missing)".red() };
            println!(
                "  {}  version {}  {}{state}",
                snapshot.created_at.format("%Y-%m-%d %H:%M:%S"),
                snapshot.version,
                snapshot.path.display()
            );
        }
        Ok(())
    }
}
