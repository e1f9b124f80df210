//! Manage the ghpush configuration file.
//!
//! The file (`~/.ghpush/config.toml` unless `--config` or
//! `GHPUSH_CONFIG_PATH` points elsewhere) holds the WordPress directories,
//! the data directory, GitHub endpoints, timeouts and retention limits.
//! Every setting has a default, so the file is optional.
//!
//! # Examples
//!
//! ```bash
//! ghpush config init
//! ghpush config show
//! ghpush config path
//! ```

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use super::CliContext;
use crate::config::GlobalConfig;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: Option<ConfigSubcommands>,
}

#[derive(Subcommand)]
enum ConfigSubcommands {
    /// Write a configuration file with the default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the settings in effect
    Show,

    /// Print the configuration file location
    Path,
}

impl ConfigCommand {
    /// Runs the subcommand; without one the settings are shown.
    pub async fn execute(self, ctx: &CliContext) -> Result<()> {
        match self.command {
            Some(ConfigSubcommands::Init {
                force,
            }) => Self::init(ctx, force).await,
            Some(ConfigSubcommands::Show) | None => Self::show(ctx).await,
            Some(ConfigSubcommands::Path) => {
                println!("{}", ctx.config_path()?.display());
                Ok(())
            }
        }
    }

    async fn init(ctx: &CliContext, force: bool) -> Result<()> {
        let config_path = ctx.config_path()?;

        if config_path.exists() && !force {
            println!("❌ Config already exists at: {}", config_path.display());
            println!("   Use --force to overwrite");
            return Ok(());
        }

        let config = GlobalConfig::default();
        config.save_to(&config_path).await?;

        println!("✅ Created config at: {}", config_path.display());
        println!("\n{}", toml::to_string_pretty(&config)?);
        println!("{}", "Next steps:".yellow());
        println!("  1. Point plugins_dir and themes_dir at your WordPress installation");
        println!("  2. Register a component with 'ghpush component add'");
        Ok(())
    }

    async fn show(ctx: &CliContext) -> Result<()> {
        let config_path = ctx.config_path()?;
        let config = ctx.load_config().await?;

        println!("{}", "Configuration".bold());
        println!("Location: {}", config_path.display());
        if !config_path.exists() {
            println!("(file not found, showing defaults)");
        }
        println!("\n{}", toml::to_string_pretty(&config)?);

        if !config_path.exists() {
            println!("{}", "Tip:".yellow());
            println!("  Run 'ghpush config init' to write these settings to disk");
        }
        Ok(())
    }
}
