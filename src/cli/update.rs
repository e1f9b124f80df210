//! Install the latest version of a registered component.
//!
//! The check always bypasses the cached decision. When an update is
//! available the installed files are backed up, the archive is downloaded
//! and extracted, and the install directory is replaced.
//!
//! # Examples
//!
//! ```bash
//! ghpush update shop-1714564800
//! ghpush update shop-1714564800 --json
//! ```
//!
//! # Error Conditions
//!
//! - Unknown component id
//! - GitHub errors while checking or downloading
//! - Another update or rollback of the same component is running
//! - Extraction or file replacement failures (restore with `ghpush rollback`)

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::{CliContext, print_json};
use crate::apply::UpdateStatus;
use crate::utils::Spinner;

#[derive(Args)]
pub struct UpdateCommand {
    /// Component id
    id: String,

    /// Print JSON
    #[arg(long)]
    json: bool,
}

impl UpdateCommand {
    pub async fn execute(self, ctx: &CliContext) -> Result<()> {
        let push = ctx.push().await?;

        let spinner = Spinner::start(format!("Updating {}", self.id), ctx.quiet || self.json);
        let outcome = push.update_plugin(&self.id).await;
        spinner.finish();
        let outcome = outcome?;

        if self.json {
            return print_json(&outcome);
        }
        match outcome.status {
            UpdateStatus::Updated => println!(
                "✅ {} {} ({} -> {})",
                self.id.bold(),
                outcome.message(),
                outcome.previous_version,
                outcome.version.green()
            ),
            UpdateStatus::NoUpdate => {
                println!("{}: {} (installed {})", self.id.bold(), outcome.message(), outcome.version);
            }
        }
        Ok(())
    }
}
