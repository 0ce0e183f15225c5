// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the volunteer coordinator CLI

pub mod config;
pub mod db;
pub mod sweep;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use self::config::ConfigCommand;
pub use self::db::DbCommand;
pub use self::sweep::SweepCommand;

/// Volunteer coordinator operations
#[derive(Parser)]
#[command(name = "volunteer")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "VOLUNTEER_CONFIG_PATH",
        value_name = "FILE"
    )]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "VOLUNTEER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format (text, json)
    #[arg(long, global = true, env = "VOLUNTEER_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Database schema management
    #[command(name = "db")]
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },

    /// Periodic maintenance sweeps
    #[command(name = "sweep")]
    Sweep {
        #[command(subcommand)]
        command: SweepCommand,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_absence_sweep() {
        let cli = Cli::try_parse_from([
            "volunteer",
            "--config",
            "/tmp/volunteer.yaml",
            "sweep",
            "absences",
            "--days",
            "3",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/volunteer.yaml")));
        match cli.command {
            Some(Commands::Sweep {
                command: SweepCommand::Absences { days, dry_run, json },
            }) => {
                assert_eq!(days, Some(3));
                assert!(dry_run);
                assert!(!json);
            }
            _ => panic!("expected sweep absences"),
        }
    }

    #[test]
    fn test_parse_db_migrate() {
        let cli = Cli::try_parse_from(["volunteer", "db", "migrate", "--dry-run"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Db {
                command: DbCommand::Migrate { dry_run: true }
            })
        ));
    }

    #[test]
    fn test_unknown_subcommand_rejected() {
        assert!(Cli::try_parse_from(["volunteer", "daemon", "start"]).is_err());
    }
}
