//! `ghpush repo-info` and `ghpush version`.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::{CliContext, print_json};

#[derive(Args)]
pub struct RepoInfoCommand {
    /// Repository URL
    url: String,

    /// Access token for private repositories
    #[arg(long)]
    token: Option<String>,

    /// Print JSON
    #[arg(long)]
    json: bool,
}

impl RepoInfoCommand {
    pub async fn execute(self, ctx: &CliContext) -> Result<()> {
        let push = ctx.push().await?;
        let info = push.get_repo_info(&self.url, self.token.as_deref()).await?;

        if self.json {
            return print_json(&info);
        }
        println!("{}", info.full_name.bold());
        if let Some(description) = info.description.as_deref().filter(|d| !d.is_empty()) {
            println!("  {description}");
        }
        println!("  owner: {}", info.owner);
        println!("  name:  {}", info.name);
        Ok(())
    }
}

#[derive(Args)]
pub struct VersionCommand {
    /// Component id
    id: String,
}

impl VersionCommand {
    pub async fn execute(self, ctx: &CliContext) -> Result<()> {
        let push = ctx.push().await?;
        println!("{}", push.get_current_version(&self.id)?);
        Ok(())
    }
}
