//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::anti_patterns::AntiPatternsArgs;
use crate::cli::commands::learned::LearnedArgs;
use crate::cli::commands::mode::ModeArgs;
use crate::cli::commands::route::RouteArgs;

#[derive(Parser, Debug)]
#[command(name = "remedy")]
#[command(about = "Remedy - self-evolving repair strategy engine", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .remedy/config.yaml and .remedy/local.yaml)
    #[arg(short, long, global = true, env = "REMEDY_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decide how to repair one failure
    Route(RouteArgs),

    /// List learned records for an archetype
    Learned(LearnedArgs),

    /// List options flagged as anti-patterns for an archetype
    AntiPatterns(AntiPatternsArgs),

    /// Show the escalation mode for a retry count
    Mode(ModeArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_route() {
        let cli = Cli::try_parse_from([
            "remedy",
            "--json",
            "route",
            "--error",
            "Cannot find module 'chart.js'",
            "--archetype",
            "dashboard",
            "--retries",
            "2",
        ])
        .unwrap();

        assert!(cli.json);
        match cli.command {
            Commands::Route(args) => {
                assert_eq!(args.archetype, "dashboard");
                assert_eq!(args.retries, 2);
                assert_eq!(args.session, "cli");
                assert!(args.quality.is_none());
            }
            other => panic!("Expected route command, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_anti_patterns_defaults() {
        let cli = Cli::try_parse_from(["remedy", "anti-patterns", "--archetype", "api"]).unwrap();
        match cli.command {
            Commands::AntiPatterns(args) => {
                assert_eq!(args.limit, 10);
                assert!(args.context_type.is_none());
            }
            other => panic!("Expected anti-patterns command, got {other:?}"),
        }
    }

    #[test]
    fn test_route_requires_archetype() {
        assert!(Cli::try_parse_from(["remedy", "route", "--error", "boom"]).is_err());
    }

    #[test]
    fn test_global_json_after_subcommand() {
        let cli = Cli::try_parse_from(["remedy", "mode", "--retries", "5", "--json"]).unwrap();
        assert!(cli.json);
    }
}
