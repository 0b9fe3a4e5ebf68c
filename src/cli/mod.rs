//! Command-line interface module.
//!
//! This module defines the CLI structure using Clap, including
//! all commands, arguments, and options.
//!
//! # Commands
//!
//! - `check`: Report newer tags for every git-sourced module
//! - `update`: Pin every git-sourced module to its newest tag and commit
//! - `init`: Create an example configuration file
//! - `validate`: Validate a configuration file
//!
//! # Example Usage
//!
//! ```bash
//! # Report on one directory
//! samwise check --path ./terraform
//!
//! # Whole tree, JSON, only the newest version per module
//! samwise check --path ./terraform -d -1 -o json --latest-version
//!
//! # Rewrite refs in place and commit on a dated branch
//! samwise update --path ./terraform -d -1
//!
//! # Clone a repository, update it, commit in the clone
//! samwise update --repo git@github.com:org/infra.git --workdir /tmp/infra
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// samwise - keeps Terraform git module sources up to date.
#[derive(Parser, Debug)]
#[command(
    name = "samwise",
    author,
    version,
    about = "Track and update versions of Terraform modules sourced from git",
    long_about = "samwise walks Terraform directories, finds module sources that point at \
                  git repositories, lists the tags of each repository and reports the \
                  versions newer than the pinned ref. In update mode it rewrites the ref \
                  to the newest tag and commits the change on a dated branch."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "SAMWISE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search (sub)directories for module sources and report available updates
    #[command(visible_alias = "c", alias = "checkForUpdates")]
    Check(CheckArgs),

    /// Pin module sources to their newest version and commit the change
    #[command(visible_alias = "u")]
    Update(UpdateArgs),

    /// Create an example configuration file
    Init,

    /// Validate a configuration file
    Validate(ValidateArgs),
}

/// Arguments for the check command.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Directory containing Terraform code
    #[arg(long, value_name = "DIR")]
    pub path: PathBuf,

    /// Folder depth to search for modules in; -1 for the whole tree
    #[arg(short, long, allow_negative_numbers = true)]
    pub depth: Option<i32>,

    /// Directory names to skip (repeatable)
    #[arg(short, long, value_name = "NAME")]
    pub ignore: Vec<String>,

    /// Report format: csv or json
    #[arg(short, long, value_name = "FORMAT")]
    pub output: Option<String>,

    /// Report file name, without extension
    #[arg(short = 'f', long, value_name = "NAME")]
    pub output_filename: Option<String>,

    /// Only report the newest available version
    #[arg(long)]
    pub latest_version: bool,

    /// Add a column telling whether the newest version is a major upgrade
    #[arg(long)]
    pub flag_major_upgrades: bool,
}

/// Arguments for the update command.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Directory containing Terraform code (must be inside a git work tree to commit)
    #[arg(long, value_name = "DIR", required_unless_present = "repo", conflicts_with = "repo")]
    pub path: Option<PathBuf>,

    /// Repository to clone and update instead of a local directory
    #[arg(long, value_name = "URL")]
    pub repo: Option<String>,

    /// Where to clone `--repo` to (a temporary directory if omitted)
    #[arg(long, value_name = "DIR", requires = "repo")]
    pub workdir: Option<PathBuf>,

    /// Folder depth to search for modules in; -1 for the whole tree
    #[arg(short, long, allow_negative_numbers = true)]
    pub depth: Option<i32>,

    /// Directory names to skip (repeatable)
    #[arg(short, long, value_name = "NAME")]
    pub ignore: Vec<String>,

    /// Rewrite files but do not commit
    #[arg(long)]
    pub no_commit: bool,

    /// Skip the formatter pass
    #[arg(long)]
    pub no_format: bool,
}

/// Arguments for the validate command.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(value_name = "FILE", default_value = "samwise.yaml")]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parsing() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_check_command() {
        let cli = Cli::parse_from(["samwise", "check", "--path", "./terraform"]);
        match cli.command {
            Commands::Check(args) => {
                assert_eq!(args.path, PathBuf::from("./terraform"));
                assert!(args.depth.is_none());
                assert!(args.output.is_none());
                assert!(!args.latest_version);
            }
            _ => panic!("Expected Check command"),
        }
    }

    #[test]
    fn test_check_with_options() {
        let cli = Cli::parse_from([
            "samwise",
            "check",
            "--path",
            "./terraform",
            "-d",
            "-1",
            "-i",
            ".git",
            "-i",
            "vendor",
            "-o",
            "json",
            "-f",
            "report",
            "--latest-version",
            "--flag-major-upgrades",
        ]);
        match cli.command {
            Commands::Check(args) => {
                assert_eq!(args.depth, Some(-1));
                assert_eq!(args.ignore, vec![".git", "vendor"]);
                assert_eq!(args.output.as_deref(), Some("json"));
                assert_eq!(args.output_filename.as_deref(), Some("report"));
                assert!(args.latest_version);
                assert!(args.flag_major_upgrades);
            }
            _ => panic!("Expected Check command"),
        }
    }

    #[test]
    fn test_check_requires_path() {
        assert!(Cli::try_parse_from(["samwise", "check"]).is_err());
    }

    #[test]
    fn test_legacy_alias() {
        let cli = Cli::parse_from(["samwise", "checkForUpdates", "--path", "."]);
        assert!(matches!(cli.command, Commands::Check(_)));
    }

    #[test]
    fn test_update_with_path() {
        let cli = Cli::parse_from(["samwise", "update", "--path", "./infra", "--no-commit"]);
        match cli.command {
            Commands::Update(args) => {
                assert_eq!(args.path, Some(PathBuf::from("./infra")));
                assert!(args.no_commit);
                assert!(!args.no_format);
            }
            _ => panic!("Expected Update command"),
        }
    }

    #[test]
    fn test_update_with_repo() {
        let cli = Cli::parse_from([
            "samwise",
            "u",
            "--repo",
            "git@github.com:org/infra.git",
            "--workdir",
            "/tmp/infra",
        ]);
        match cli.command {
            Commands::Update(args) => {
                assert_eq!(args.repo.as_deref(), Some("git@github.com:org/infra.git"));
                assert_eq!(args.workdir, Some(PathBuf::from("/tmp/infra")));
            }
            _ => panic!("Expected Update command"),
        }
    }

    #[test]
    fn test_update_needs_path_or_repo() {
        assert!(Cli::try_parse_from(["samwise", "update"]).is_err());
        assert!(Cli::try_parse_from(["samwise", "update", "--path", ".", "--repo", "x"]).is_err());
    }

    #[test]
    fn test_init_command() {
        let cli = Cli::parse_from(["samwise", "init"]);
        assert!(matches!(cli.command, Commands::Init));
    }

    #[test]
    fn test_validate_command() {
        let cli = Cli::parse_from(["samwise", "validate", "custom.yaml"]);
        match cli.command {
            Commands::Validate(args) => {
                assert_eq!(args.config, PathBuf::from("custom.yaml"));
            }
            _ => panic!("Expected Validate command"),
        }
    }

    #[test]
    fn test_global_options() {
        let cli = Cli::parse_from([
            "samwise",
            "-vvv",
            "--config",
            "custom.yaml",
            "check",
            "--path",
            ".",
        ]);
        assert_eq!(cli.verbose, 3);
        assert_eq!(cli.config, Some(PathBuf::from("custom.yaml")));
    }
}
