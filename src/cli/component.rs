//! `ghpush component` - manage registrations.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use super::{CliContext, print_json};
use crate::core::{ComponentKind, DEFAULT_BRANCH, RefSelector, Registration};
use crate::service::NewComponent;

#[derive(Args)]
pub struct ComponentCommand {
    #[command(subcommand)]
    command: ComponentSubcommands,
}

#[derive(Subcommand)]
enum ComponentSubcommands {
    /// Register a GitHub repository as the update source of an installed component
    ///
    /// The repository is checked first: it must exist and carry the version
    /// file with a name and `Version:` header. Use --no-verify to skip this.
    Add(AddArgs),

    /// List registered components
    List {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one registration
    Show {
        id: String,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a registration
    Remove {
        id: String,
        /// Keep the component's backup archives
        #[arg(long)]
        keep_backups: bool,
    },

    /// Mark a component active; it is re-activated after updates
    Activate { id: String },

    /// Mark a component inactive
    Deactivate { id: String },
}

#[derive(Args)]
struct AddArgs {
    /// Repository URL (https://github.com/OWNER/REPO or git@github.com:OWNER/REPO.git)
    #[arg(long)]
    repo: String,

    /// Plugin entry file relative to the plugins directory, or theme directory name
    #[arg(long)]
    slug: String,

    /// Component kind
    #[arg(long, default_value = "plugin")]
    kind: ComponentKind,

    /// Display name; read from the version file header when omitted
    #[arg(long)]
    name: Option<String>,

    /// Explicit id; generated from the name when omitted
    #[arg(long)]
    id: Option<String>,

    /// Follow this branch
    #[arg(long, conflicts_with = "tags")]
    branch: Option<String>,

    /// Follow release tags instead of a branch
    #[arg(long)]
    tags: bool,

    /// Access token for private repositories
    #[arg(long)]
    token: Option<String>,

    /// Skip the repository check
    #[arg(long)]
    no_verify: bool,
}

impl ComponentCommand {
    pub async fn execute(self, ctx: &CliContext) -> Result<()> {
        let push = ctx.push().await?;
        match self.command {
            ComponentSubcommands::Add(args) => args.execute(&push).await,
            ComponentSubcommands::List {
                json,
            } => {
                let components = push.list_components()?;
                if json {
                    return print_json(&components);
                }
                if components.is_empty() {
                    println!("No components registered.");
                    println!("\n{}", "Tip:".yellow());
                    println!("  Register one with: ghpush component add --repo <url> --slug <slug>");
                    return Ok(());
                }
                for registration in &components {
                    println!(
                        "{}  {} {} ({}, {})",
                        registration.id.bold(),
                        registration.kind,
                        registration.name,
                        registration.repository,
                        registration.ref_selector
                    );
                }
                Ok(())
            }
            ComponentSubcommands::Show {
                id,
                json,
            } => {
                let registration = push.component(&id)?;
                if json {
                    return print_json(&registration);
                }
                print_registration(&registration, &push.get_current_version(&id)?, push.is_active(&id)?);
                Ok(())
            }
            ComponentSubcommands::Remove {
                id,
                keep_backups,
            } => {
                let removed = push.remove_component(&id, keep_backups)?;
                println!("✅ Removed component '{}'", removed.registration.id.red());
                if removed.backups_removed > 0 {
                    println!("   Deleted {} backup(s)", removed.backups_removed);
                }
                Ok(())
            }
            ComponentSubcommands::Activate {
                id,
            } => {
                push.set_active(&id, true)?;
                println!("✅ '{id}' is active");
                Ok(())
            }
            ComponentSubcommands::Deactivate {
                id,
            } => {
                push.set_active(&id, false)?;
                println!("✅ '{id}' is inactive");
                Ok(())
            }
        }
    }
}

impl AddArgs {
    async fn execute(self, push: &crate::service::GitHubPush) -> Result<()> {
        let ref_selector = if self.tags {
            RefSelector::Tag
        } else {
            RefSelector::Branch {
                name: self.branch.unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            }
        };

        let mut name = self.name;
        if !self.no_verify {
            let report = push
                .validate_repository(
                    &self.repo,
                    &self.slug,
                    self.kind,
                    ref_selector.branch(),
                    self.token.as_deref(),
                )
                .await?;
            println!(
                "Found {} version {} in {}",
                report.name.bold(),
                report.version,
                report.path
            );
            name.get_or_insert(report.name);
        }

        let name = name.unwrap_or_else(|| default_name(&self.slug));
        let registration = push.register_component(NewComponent {
            id: self.id,
            name,
            kind: self.kind,
            repo_url: self.repo,
            ref_selector,
            install_slug: self.slug,
            token: self.token,
        })?;

        println!("✅ Registered {} '{}'", registration.kind, registration.id.green());
        Ok(())
    }
}

/// First path segment of the slug, e.g. `shop` for `shop/shop.php`.
fn default_name(slug: &str) -> String {
    slug.trim_matches('/').split('/').next().unwrap_or(slug).to_string()
}

fn print_registration(registration: &Registration, installed: &str, active: bool) {
    println!("{}", registration.name.bold());
    println!("  id:         {}", registration.id);
    println!("  kind:       {}", registration.kind);
    println!("  repository: {} ({})", registration.repository, registration.repo_url);
    println!("  follows:    {}", registration.ref_selector);
    println!("  slug:       {}", registration.install_slug);
    println!("  installed:  {installed}");
    println!("  active:     {}", if active { "yes" } else { "no" });
    println!("  token:      {}", if registration.token().is_some() { "set" } else { "none" });
}
