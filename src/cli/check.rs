//! `ghpush check` - look for new versions.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::{CliContext, print_json};
use crate::resolver::UpdateDecision;
use crate::utils::Spinner;

#[derive(Args)]
pub struct CheckCommand {
    /// Component id
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    id: Option<String>,

    /// Check every registered component; installs updates when auto_update is set
    #[arg(long)]
    all: bool,

    /// Ignore the cached decision
    #[arg(long)]
    force: bool,

    /// Print JSON
    #[arg(long)]
    json: bool,
}

impl CheckCommand {
    pub async fn execute(self, ctx: &CliContext) -> Result<()> {
        let push = ctx.push().await?;

        let Some(id) = self.id else {
            let spinner = Spinner::start("Checking all components", ctx.quiet || self.json);
            let results = push.check_all().await?;
            spinner.finish();

            if self.json {
                return print_json(&results);
            }
            if results.is_empty() {
                println!("No components registered.");
            }
            for entry in &results {
                let summary = entry.summary();
                let summary = if entry.error.is_some() {
                    summary.red()
                } else if entry.decision.as_ref().is_some_and(|d| d.update_available) {
                    summary.yellow()
                } else {
                    summary.normal()
                };
                println!("{}: {summary}", entry.component_id.bold());
            }
            return Ok(());
        };

        let spinner = Spinner::start(format!("Checking {id}"), ctx.quiet || self.json);
        let decision = push.check_for_updates(&id, self.force).await?;
        spinner.finish();

        if self.json {
            return print_json(&decision);
        }
        print_decision(&id, &decision);
        Ok(())
    }
}

fn print_decision(id: &str, decision: &UpdateDecision) {
    if decision.update_available {
        println!(
            "{} {} -> {}",
            format!("Update available for {id}:").yellow(),
            decision.current_version,
            decision.latest_version.green()
        );
        if let Some(url) = &decision.download_url {
            println!("  from {url}");
        }
        println!("\nRun `ghpush update {id}` to install it.");
    } else {
        println!("✅ {id} is up to date at {}", decision.current_version);
    }

    if let Some(reference) = &decision.reference {
        match &decision.commit_sha {
            Some(sha) => println!("  checked {reference} @ {}", &sha[..sha.len().min(7)]),
            None => println!("  checked {reference}"),
        }
    }
    if let Some(error) = &decision.error {
        println!("{} {error}", "warning:".yellow());
    }
}
