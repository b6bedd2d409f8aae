//! Command-line surface: `serve` (default), `migrate`, `migrate-status`,
//! `migrate-rollback` (spec §9).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

const DEFAULT_CONFIG_PATH: &str = "broker.toml";

/// MCP multi-provider broker: stdio JSON-RPC server and maintenance CLI.
#[derive(Debug, Parser)]
#[command(name = "broker", version, about)]
pub struct Cli {
    /// Path to the broker's TOML configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH, env = "BROKER_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands. `serve` runs when none is given.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the stdio JSON-RPC server.
    Serve,
    /// Apply any pending database migrations and exit.
    Migrate,
    /// Report the currently applied migration version and exit.
    MigrateStatus,
    /// Roll the schema back to an earlier migration version.
    MigrateRollback {
        /// Migration version to roll back to.
        #[arg(long = "to")]
        to_version: u32,
    },
}

impl Cli {
    /// The effective subcommand, defaulting to [`Command::Serve`].
    pub fn command(self) -> Command {
        self.command.unwrap_or(Command::Serve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_defaults_to_serve() {
        let cli = Cli::parse_from(["broker"]);
        assert!(matches!(cli.command(), Command::Serve));
    }

    #[test]
    fn migrate_rollback_requires_a_target_version() {
        let cli = Cli::parse_from(["broker", "migrate-rollback", "--to", "1"]);
        match cli.command() {
            Command::MigrateRollback { to_version } => assert_eq!(to_version, 1),
            other => panic!("expected MigrateRollback, got {other:?}"),
        }
    }

    #[test]
    fn custom_config_path_is_honored() {
        let cli = Cli::parse_from(["broker", "--config", "/tmp/custom.toml", "migrate-status"]);
        assert_eq!(cli.config, PathBuf::from("/tmp/custom.toml"));
    }
}
