// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Volunteer Coordinator CLI
//!
//! The `volunteer` binary operates a coordinator deployment. Request
//! handling lives in whatever adapter embeds the core; this binary covers
//! the operational side.
//!
//! ## Commands
//!
//! - `volunteer config show|validate|generate` - Configuration management
//! - `volunteer db migrate [--dry-run]` - Apply database migrations
//! - `volunteer sweep statuses` - Recompute automatic activity statuses
//! - `volunteer sweep absences [--days N] [--dry-run]` - Mark no-shows absent
//!
//! Sweeps are meant to be triggered by an external scheduler (cron, a
//! Kubernetes CronJob).

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use volunteer_coordinator::commands::{self, Cli, Commands};
use volunteer_coordinator::logging;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init_logging(&cli.log_level, &cli.log_format)?;

    match cli.command {
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Db { command }) => commands::db::handle_command(command, cli.config).await,
        Some(Commands::Sweep { command }) => {
            commands::sweep::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}
