// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application Layer
//!
//! Workflow services that drive the domain aggregates inside one unit of
//! work each, plus the wiring that assembles them from configuration.

pub mod status_engine;
pub mod capacity_ledger;
pub mod application_workflow;
pub mod check_in_codes;
pub mod attendance;
pub mod deletion_requests;
pub mod activity_service;
pub mod repository_factory;
pub mod services;

// Re-export services for convenience
pub use status_engine::{StatusEngine, StatusSweepReport};
pub use capacity_ledger::CapacityLedger;
pub use application_workflow::{ApplicationService, ApplicationView, StandardApplicationService};
pub use check_in_codes::CheckInCodeManager;
pub use attendance::{AbsenceSweepReport, ActivityAbsences, CheckInService, StandardCheckInService};
pub use deletion_requests::{
    DeletionRequestService, DeletionRequestView, StandardDeletionRequestService,
};
pub use activity_service::{ActivityService, StandardActivityService};
pub use services::{Coordinator, CoordinatorBuilder, CoordinatorSettings};
