// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Database Commands
//!
//! Applies the embedded schema migrations to the configured PostgreSQL
//! database.
//!
//! # Usage
//!
//! ```bash
//! # Apply all pending migrations
//! volunteer db migrate
//!
//! # Preview migrations without applying
//! volunteer db migrate --dry-run
//! ```

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use volunteer_core::domain::config::CoordinatorConfigManifest;
use volunteer_core::domain::repository::StorageBackend;
use volunteer_core::infrastructure::db::PostgresDatabase;

#[derive(Subcommand)]
pub enum DbCommand {
    /// Apply pending schema migrations
    Migrate {
        /// List pending migrations without applying them
        #[arg(long)]
        dry_run: bool,
    },
}

pub async fn handle_command(command: DbCommand, config_path: Option<PathBuf>) -> Result<()> {
    match command {
        DbCommand::Migrate { dry_run } => migrate(config_path, dry_run).await,
    }
}

async fn migrate(config_path: Option<PathBuf>, dry_run: bool) -> Result<()> {
    let config = CoordinatorConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    let postgres = match config.storage_backend()? {
        StorageBackend::PostgreSQL(postgres) => postgres,
        StorageBackend::InMemory => anyhow::bail!(
            "The in-memory backend has no schema. Set spec.database.backend to 'postgres' \
             or export VOLUNTEER_DATABASE_URL."
        ),
    };

    println!("Connecting to database...");
    let database = PostgresDatabase::connect(&postgres).await?;

    let pending = database.pending_migrations().await?;
    if pending.is_empty() {
        println!("{}", "✓ Database schema is up to date.".green());
        return Ok(());
    }

    println!("{} pending migration(s):", pending.len());
    for (version, description) in &pending {
        println!("  - {} {}", version, description);
    }

    if dry_run {
        println!("{}", "Dry run: no changes applied.".yellow());
        return Ok(());
    }

    println!("Applying migrations...");
    database.migrate().await?;
    println!("{}", "✓ Migrations applied successfully.".green());

    Ok(())
}
