// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Coordinator Errors
//!
//! Every variant is recoverable by the caller and renders a user-facing
//! message through `Display`.

use crate::domain::activity::{ActivityId, ActivityStatus};
use crate::domain::actor::UserId;
use crate::domain::repository::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Cannot {action} {entity} in status '{status}'")]
    InvalidState {
        entity: &'static str,
        status: String,
        action: &'static str,
    },

    #[error("Activity is not accepting applications (status: {0})")]
    NotOpen(ActivityStatus),

    #[error("Activity {0} has reached its participant limit")]
    CapacityExceeded(ActivityId),

    #[error("Student {student} already has an application for activity {activity}")]
    DuplicateApplication { activity: ActivityId, student: UserId },

    #[error("You must have an approved application to check in")]
    NoApprovedApplication,

    #[error("You have already checked in to this activity")]
    AlreadyCheckedIn,

    #[error("Invalid check-in code")]
    InvalidCode,

    #[error("Activity has not started yet")]
    NotStartedYet,

    #[error("Activity has already ended")]
    AlreadyEnded,

    #[error("Activity has no reserved seats; delete it directly instead")]
    DeletionNotRequired,

    #[error("Participants exist; deletion requires admin approval")]
    DeletionRequiresApproval,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl CoordinatorError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_state(
        entity: &'static str,
        status: impl std::fmt::Display,
        action: &'static str,
    ) -> Self {
        Self::InvalidState {
            entity,
            status: status.to_string(),
            action,
        }
    }
}
