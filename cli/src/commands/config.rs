// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use volunteer_core::domain::config::{CoordinatorConfigManifest, StorageBackendKind};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./volunteer-config.yaml)
        #[arg(short, long, default_value = "./volunteer-config.yaml")]
        output: PathBuf,

        /// Include a grouped category taxonomy and every optional section
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(&output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = CoordinatorConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. VOLUNTEER_CONFIG_PATH: {}",
            std::env::var("VOLUNTEER_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./volunteer-config.yaml");
        println!("  4. ~/.volunteer/config.yaml");
        println!("  5. /etc/volunteer/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Deployment:".bold());
    println!("  Name: {}", config.metadata.name);
    if let Some(version) = &config.metadata.version {
        println!("  Version: {}", version);
    }
    println!();

    let database = &config.spec.database;
    println!("{}", "Database:".bold());
    match database.backend {
        StorageBackendKind::InMemory => println!("  Backend: in-memory"),
        StorageBackendKind::Postgres => {
            println!("  Backend: postgres");
            println!(
                "  URL: {}",
                database.url.as_deref().map(redact_url).unwrap_or_else(|| "(not set)".to_string())
            );
        }
    }
    println!("  Max connections: {}", database.max_connections);
    println!();

    let scheduling = &config.spec.scheduling;
    println!("{}", "Scheduling:".bold());
    println!("  Upcoming window: {} days", scheduling.upcoming_window_days);
    println!("  Absence lookback: {} days", scheduling.absence_lookback_days);
    println!(
        "  Attendance day offset: UTC{:+} minutes",
        config.spec.attendance.utc_offset_minutes
    );
    println!();

    let taxonomy = config.spec.taxonomy.metadata();
    println!("{}", "Categories:".bold());
    println!("  Max per activity: {}", taxonomy.categories_max);
    for top_level in &taxonomy.top_levels {
        println!("  {}", top_level.bold());
        if let Some(items) = taxonomy.subcategories.get(top_level) {
            for item in items {
                println!("    - {}", item);
            }
        }
    }
    println!();

    if let Some(logging) = config.logging() {
        println!("{}", "Logging:".bold());
        println!("  Level: {}", logging.level);
        println!("  Format: {}", logging.format);
        println!();
    }

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = CoordinatorConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: &Path, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

/// Hide the password portion of a connection URL
fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.split_once('@') {
        Some((credentials, host)) => {
            let user = credentials.split(':').next().unwrap_or_default();
            format!("{}://{}:****@{}", scheme, user, host)
        }
        None => url.to_string(),
    }
}
