//! ghpush CLI entry point
//!
//! Parses arguments, installs the tracing subscriber, runs the command and
//! renders failures through [`user_friendly_error`].

use anyhow::Result;
use clap::Parser;
use github_push::cli;
use github_push::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    cli::init_logging(cli.log_level().as_deref());

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
