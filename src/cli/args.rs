//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::cache::CacheArgs;

/// Stencil - resolve the template set for a project.
#[derive(Debug, Parser)]
#[command(name = "stencil")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to an extra config file (applied after user and project config)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to project root (overrides current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Decide which templates to install and show where they come from
    Resolve(ResolveArgs),

    /// Inspect and clean scratch directories
    Cache(CacheArgs),
}

/// Arguments for the `resolve` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ResolveArgs {
    /// Never touch the network
    #[arg(long, env = "STENCIL_OFFLINE")]
    pub offline: bool,

    /// Ignore local overrides and download a fresh snapshot
    #[arg(long)]
    pub force_download: bool,

    /// Template repository as OWNER/REPO (or REPO)
    #[arg(long, value_name = "OWNER/REPO")]
    pub repo: Option<String>,

    /// Branch to download
    #[arg(long)]
    pub branch: Option<String>,

    /// Application type of the project
    #[arg(long)]
    pub app_type: Option<String>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_resolve_flags() {
        let cli = Cli::try_parse_from([
            "stencil",
            "resolve",
            "--offline",
            "--repo",
            "acme/templates",
            "--branch",
            "next",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Resolve(args) => {
                assert!(args.offline);
                assert!(!args.force_download);
                assert_eq!(args.repo.as_deref(), Some("acme/templates"));
                assert_eq!(args.branch.as_deref(), Some("next"));
                assert!(args.json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["stencil", "resolve", "--project", "/p", "--quiet"]).unwrap();
        assert_eq!(cli.project, Some(PathBuf::from("/p")));
        assert!(cli.quiet);
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["stencil"]).is_err());
    }
}
