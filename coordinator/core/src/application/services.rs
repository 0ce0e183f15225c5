// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Coordinator Service Wiring
//!
//! Builds every application service over one shared database, clock and
//! event bus. Embedders (the CLI, an HTTP adapter, tests) hold a
//! [`Coordinator`] and call the service traits through it.

use anyhow::{Context, Result};
use chrono::{Duration, FixedOffset, Offset, Utc};
use std::sync::Arc;

use crate::application::activity_service::{ActivityService, StandardActivityService};
use crate::application::application_workflow::{ApplicationService, StandardApplicationService};
use crate::application::attendance::{CheckInService, StandardCheckInService};
use crate::application::check_in_codes::CheckInCodeManager;
use crate::application::deletion_requests::{DeletionRequestService, StandardDeletionRequestService};
use crate::application::repository_factory::create_database;
use crate::application::status_engine::StatusEngine;
use crate::domain::activity::DEFAULT_UPCOMING_WINDOW_DAYS;
use crate::domain::check_in::{CodeGenerator, RandomCodeGenerator};
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::config::CoordinatorConfigManifest;
use crate::domain::repository::Database;
use crate::domain::taxonomy::CategoryTaxonomy;
use crate::infrastructure::event_bus::EventBus;

/// Runtime settings derived from the configuration manifest
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub upcoming_window: Duration,
    pub utc_offset: FixedOffset,
    pub absence_lookback_days: u32,
    pub taxonomy: CategoryTaxonomy,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            upcoming_window: Duration::days(DEFAULT_UPCOMING_WINDOW_DAYS),
            utc_offset: Utc.fix(),
            absence_lookback_days: 7,
            taxonomy: CategoryTaxonomy::default(),
        }
    }
}

impl CoordinatorSettings {
    pub fn from_manifest(manifest: &CoordinatorConfigManifest) -> Result<Self> {
        manifest.validate()?;
        let spec = &manifest.spec;
        let utc_offset = spec
            .attendance
            .utc_offset()
            .context("spec.attendance.utc_offset_minutes is out of range")?;
        let upcoming_window = spec
            .scheduling
            .upcoming_window()
            .context("spec.scheduling.upcoming_window_days is out of range")?;
        let absence_lookback_days = u32::try_from(spec.scheduling.absence_lookback_days)
            .context("spec.scheduling.absence_lookback_days must not be negative")?;

        Ok(Self {
            upcoming_window,
            utc_offset,
            absence_lookback_days,
            taxonomy: spec.taxonomy.clone(),
        })
    }
}

pub struct Coordinator {
    pub database: Arc<dyn Database>,
    pub clock: Arc<dyn Clock>,
    pub event_bus: Arc<EventBus>,
    pub status_engine: Arc<StatusEngine>,
    pub activities: Arc<dyn ActivityService>,
    pub applications: Arc<dyn ApplicationService>,
    pub attendance: Arc<dyn CheckInService>,
    pub deletion_requests: Arc<dyn DeletionRequestService>,
    pub settings: CoordinatorSettings,
}

impl Coordinator {
    pub fn builder(database: Arc<dyn Database>) -> CoordinatorBuilder {
        CoordinatorBuilder {
            database,
            settings: CoordinatorSettings::default(),
            clock: None,
            code_generator: None,
        }
    }

    /// Connect the configured backend and wire every service with the
    /// system clock
    pub async fn from_manifest(
        manifest: &CoordinatorConfigManifest,
        migrate: bool,
    ) -> Result<Self> {
        let settings = CoordinatorSettings::from_manifest(manifest)?;
        let backend = manifest.storage_backend()?;
        let database = create_database(&backend, migrate).await?;
        Ok(Self::builder(database).with_settings(settings).build())
    }
}

pub struct CoordinatorBuilder {
    database: Arc<dyn Database>,
    settings: CoordinatorSettings,
    clock: Option<Arc<dyn Clock>>,
    code_generator: Option<Arc<dyn CodeGenerator>>,
}

impl CoordinatorBuilder {
    pub fn with_settings(mut self, settings: CoordinatorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_code_generator(mut self, generator: Arc<dyn CodeGenerator>) -> Self {
        self.code_generator = Some(generator);
        self
    }

    pub fn build(self) -> Coordinator {
        let Self {
            database,
            settings,
            clock,
            code_generator,
        } = self;
        let clock: Arc<dyn Clock> = match clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let generator: Arc<dyn CodeGenerator> = match code_generator {
            Some(generator) => generator,
            None => Arc::new(RandomCodeGenerator),
        };
        let event_bus = Arc::new(EventBus::with_default_capacity());

        let status_engine = Arc::new(StatusEngine::new(
            database.clone(),
            clock.clone(),
            settings.upcoming_window,
            event_bus.clone(),
        ));
        let activities = Arc::new(StandardActivityService::new(
            database.clone(),
            clock.clone(),
            Arc::new(settings.taxonomy.clone()),
            status_engine.clone(),
            event_bus.clone(),
        ));
        let applications = Arc::new(StandardApplicationService::new(
            database.clone(),
            clock.clone(),
            status_engine.clone(),
            event_bus.clone(),
        ));
        let codes =
            CheckInCodeManager::with_generator(clock.clone(), settings.utc_offset, generator);
        let attendance = Arc::new(StandardCheckInService::new(
            database.clone(),
            clock.clone(),
            codes,
            status_engine.clone(),
            event_bus.clone(),
        ));
        let deletion_requests = Arc::new(StandardDeletionRequestService::new(
            database.clone(),
            clock.clone(),
            event_bus.clone(),
        ));

        Coordinator {
            database,
            clock,
            event_bus,
            status_engine,
            activities,
            applications,
            attendance,
            deletion_requests,
            settings,
        }
    }
}
