//! Argument parsing tests for the CLI.

use super::{Cli, Commands};
use clap::Parser;
use std::path::PathBuf;

#[test]
fn test_cli_parsing() {
    // --help surfaces as a clap error
    assert!(Cli::try_parse_from(["ghpush", "--help"]).is_err());
    assert!(Cli::try_parse_from(["ghpush", "component", "list"]).is_ok());
    assert!(Cli::try_parse_from(["ghpush"]).is_err());
}

#[test]
fn test_verbose_and_quiet_flags() {
    let cli = Cli::try_parse_from(["ghpush", "--verbose", "logs"]).unwrap();
    assert!(cli.verbose);
    assert_eq!(cli.log_level().as_deref(), Some("debug"));

    let cli = Cli::try_parse_from(["ghpush", "logs", "--quiet"]).unwrap();
    assert!(cli.quiet);
    assert_eq!(cli.log_level().as_deref(), Some("off"));
    assert!(cli.context().quiet);

    let cli = Cli::try_parse_from(["ghpush", "logs"]).unwrap();
    assert_eq!(cli.log_level(), None);

    assert!(Cli::try_parse_from(["ghpush", "-v", "-q", "logs"]).is_err());
}

#[test]
fn test_config_flag_is_global() {
    let cli = Cli::try_parse_from(["ghpush", "check", "--all", "--config", "/tmp/ghpush.toml"])
        .unwrap();
    assert_eq!(cli.context().config_path, Some(PathBuf::from("/tmp/ghpush.toml")));
}

#[test]
fn test_check_requires_id_or_all() {
    assert!(Cli::try_parse_from(["ghpush", "check"]).is_err());
    assert!(Cli::try_parse_from(["ghpush", "check", "shop", "--all"]).is_err());
    assert!(Cli::try_parse_from(["ghpush", "check", "shop", "--force"]).is_ok());
    assert!(matches!(
        Cli::try_parse_from(["ghpush", "check", "--all"]).unwrap().command,
        Commands::Check(_)
    ));
}

#[test]
fn test_component_add_arguments() {
    let cli = Cli::try_parse_from([
        "ghpush",
        "component",
        "add",
        "--repo",
        "https://github.com/acme/shop",
        "--slug",
        "shop/shop.php",
        "--tags",
    ]);
    assert!(cli.is_ok());

    // Kind must be plugin or theme
    assert!(
        Cli::try_parse_from([
            "ghpush", "component", "add", "--repo", "acme/shop", "--slug", "shop", "--kind",
            "widget",
        ])
        .is_err()
    );

    // Branch and tags are exclusive
    assert!(
        Cli::try_parse_from([
            "ghpush", "component", "add", "--repo", "acme/shop", "--slug", "shop", "--tags",
            "--branch", "main",
        ])
        .is_err()
    );

    // Repository and slug are required
    assert!(Cli::try_parse_from(["ghpush", "component", "add", "--slug", "shop"]).is_err());
}

#[test]
fn test_rollback_arguments() {
    assert!(Cli::try_parse_from(["ghpush", "rollback", "shop"]).is_ok());
    assert!(
        Cli::try_parse_from(["ghpush", "rollback", "shop", "--backup", "/tmp/a.zip", "--version", "1.0.0"])
            .is_ok()
    );
    assert!(Cli::try_parse_from(["ghpush", "rollback", "shop", "--log-entry", "12"]).is_ok());
    assert!(
        Cli::try_parse_from(["ghpush", "rollback", "shop", "--log-entry", "12", "--backup", "a.zip"])
            .is_err()
    );
    assert!(Cli::try_parse_from(["ghpush", "rollback", "shop", "--log-entry", "twelve"]).is_err());
}

#[test]
fn test_logs_pagination_defaults() {
    let cli = Cli::try_parse_from(["ghpush", "logs", "--component", "shop", "--limit", "5"]).unwrap();
    assert!(matches!(cli.command, Commands::Logs(_)));
    assert!(Cli::try_parse_from(["ghpush", "logs", "--limit", "-1"]).is_err());
}

#[test]
fn test_config_subcommands() {
    for args in [
        vec!["ghpush", "config"],
        vec!["ghpush", "config", "show"],
        vec!["ghpush", "config", "path"],
        vec!["ghpush", "config", "init", "--force"],
    ] {
        let cli = Cli::try_parse_from(&args).unwrap();
        assert!(matches!(cli.command, Commands::Config(_)), "{args:?}");
    }
}
