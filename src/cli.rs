//! # CLI Arguments
//!
//! Command-line argument definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Ganesha Pilot - vision-driven autopilot for one application window
#[derive(Parser, Debug)]
#[command(name = "ganesha-pilot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to .ganesha/pilot.toml, then the user config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only show warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the agent loop
    Run {
        /// Window title or process name fragment (overrides config)
        #[arg(short, long)]
        target: Option<String>,

        /// Number of cycles to attempt (overrides config)
        #[arg(short = 'n', long)]
        max_events: Option<u32>,

        /// Log actions instead of executing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Look up the target window once and print it
    Locate {
        /// Window title or process name fragment (overrides config)
        #[arg(short, long)]
        target: Option<String>,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from([
            "ganesha-pilot",
            "-v",
            "run",
            "--target",
            "Game",
            "-n",
            "3",
            "--dry-run",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Run {
                target,
                max_events,
                dry_run,
            } => {
                assert_eq!(target.as_deref(), Some("Game"));
                assert_eq!(max_events, Some(3));
                assert!(dry_run);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
