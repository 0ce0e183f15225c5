// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Periodic Sweep Commands
//!
//! One-shot entry points for the jobs a scheduler (cron, a systemd timer,
//! a Kubernetes CronJob) runs against the configured database:
//!
//! - `statuses`: recompute every activity's status from the clock
//! - `absences`: mark approved applicants who never checked in as absent
//!   for activities that recently ended

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use tracing::warn;

use volunteer_core::application::{AbsenceSweepReport, Coordinator, StatusSweepReport};
use volunteer_core::domain::config::{CoordinatorConfigManifest, StorageBackendKind};

#[derive(Subcommand)]
pub enum SweepCommand {
    /// Recompute activity statuses
    Statuses {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record absences for recently completed activities
    Absences {
        /// Look back this many days (default: spec.scheduling.absence_lookback_days)
        #[arg(long)]
        days: Option<u32>,

        /// Report what would be marked without writing
        #[arg(long)]
        dry_run: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_command(command: SweepCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = CoordinatorConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    if config.spec.database.backend == StorageBackendKind::InMemory {
        warn!("Sweeping the in-memory backend; nothing persists past this process");
    }

    let coordinator = Coordinator::from_manifest(&config, false).await?;

    match command {
        SweepCommand::Statuses { json } => {
            let report = coordinator.status_engine.refresh_all().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_status_report(&report);
            }
        }
        SweepCommand::Absences {
            days,
            dry_run,
            json,
        } => {
            let days = days.unwrap_or(coordinator.settings.absence_lookback_days);
            let report = coordinator.attendance.sweep_absences(days, dry_run).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_absence_report(&report);
            }
        }
    }

    Ok(())
}

fn print_status_report(report: &StatusSweepReport) {
    if report.total() == 0 {
        println!("{}", "✓ All activity statuses are current.".green());
        return;
    }

    println!("{}", format!("✓ Updated {} activities", report.total()).green());
    println!("{:<12} {:>6}", "STATUS".bold(), "COUNT".bold());
    for (status, count) in &report.changed {
        println!("{:<12} {:>6}", status, count);
    }
}

fn print_absence_report(report: &AbsenceSweepReport) {
    println!(
        "Window: {} .. {}",
        report.window_start.format("%Y-%m-%d %H:%M"),
        report.window_end.format("%Y-%m-%d %H:%M")
    );

    if report.activities.is_empty() {
        println!("{}", "No completed activities have unmarked applicants.".dimmed());
        return;
    }

    println!(
        "{:<36}  {:<16}  {:>6}  {}",
        "ACTIVITY".bold(),
        "ENDED".bold(),
        "ABSENT".bold(),
        "TITLE".bold()
    );
    for entry in &report.activities {
        println!(
            "{:<36}  {:<16}  {:>6}  {}",
            entry.activity_id,
            entry.end_at.format("%Y-%m-%d %H:%M"),
            entry.absent,
            entry.title
        );
    }

    let summary = format!(
        "{} absence(s) across {} activities",
        report.total(),
        report.activities.len()
    );
    if report.dry_run {
        println!("{}", format!("Dry run: {} would be recorded", summary).yellow());
    } else {
        println!("{}", format!("✓ Recorded {}", summary).green());
    }
}
