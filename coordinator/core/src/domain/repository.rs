// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for each aggregate root. Every workflow operation
//! runs inside one [`UnitOfWork`] (a database transaction), so the
//! repositories are transaction-scoped and take `&mut self`.
//!
//! | Trait | Aggregate |
//! |-------|-----------|
//! | `ActivityRepository` | `Activity` |
//! | `ApplicationRepository` | `Application` |
//! | `AttendanceRepository` | `DailyCheckInCode`, `StudentCheckIn` |
//! | `DeletionRequestRepository` | `ActivityDeletionRequest` |
//!
//! `InMemoryUnitOfWork` and `PostgresUnitOfWork` implement every trait.
//!
//! ## Storage Backend Abstraction
//!
//! A [`Database`] hands out units of work. The backend is selected from
//! configuration: in-memory for development and tests, PostgreSQL for
//! production. Dropping a unit of work without calling
//! [`UnitOfWork::commit`] rolls back every change made through it.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::domain::activity::{Activity, ActivityId, ActivityStatus};
use crate::domain::actor::UserId;
use crate::domain::application::{Application, ApplicationId, ApplicationStatus};
use crate::domain::check_in::{DailyCheckInCode, StudentCheckIn};
use crate::domain::deletion_request::{
    ActivityDeletionRequest, DeletionRequestId, DeletionRequestStatus,
};

/// Storage backend enum for pluggable persistence
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
    pub max_connections: u32,
}

// ============================================================================
// Query Objects
// ============================================================================

/// Activity listing criteria; all set criteria must match
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    /// Only these statuses
    pub statuses: Option<Vec<ActivityStatus>>,
    pub excluded_statuses: Vec<ActivityStatus>,
    pub organization: Option<String>,
    pub ids: Option<Vec<ActivityId>>,
    /// `end_at` within `[from, to)`
    pub ended_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl ActivityFilter {
    pub fn matches(&self, activity: &Activity) -> bool {
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&activity.status) {
                return false;
            }
        }
        if self.excluded_statuses.contains(&activity.status) {
            return false;
        }
        if let Some(org) = &self.organization {
            if &activity.organization != org {
                return false;
            }
        }
        if let Some(ids) = &self.ids {
            if !ids.contains(&activity.id) {
                return false;
            }
        }
        if let Some((from, to)) = self.ended_between {
            if activity.end_at < from || activity.end_at >= to {
                return false;
            }
        }
        true
    }
}

/// Application listing criteria; all set criteria must match
#[derive(Debug, Clone, Default)]
pub struct ApplicationFilter {
    pub activity_id: Option<ActivityId>,
    pub student_id: Option<UserId>,
    /// Organization owning the (still existing) activity
    pub organization: Option<String>,
    pub status: Option<ApplicationStatus>,
}

/// Outcome of a conditional seat reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatReservation {
    /// Seat taken; carries the new reserved-seat count
    Reserved(u32),
    Full,
}

/// One row moved by a status refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub activity_id: ActivityId,
    pub from: ActivityStatus,
    pub to: ActivityStatus,
}

// ============================================================================
// Repositories
// ============================================================================

/// Repository interface for Activity aggregates
#[async_trait]
pub trait ActivityRepository: Send {
    async fn insert_activity(&mut self, activity: &Activity) -> Result<(), RepositoryError>;

    /// Persist content fields and status. Never writes `current_participants`.
    async fn update_activity(&mut self, activity: &Activity) -> Result<(), RepositoryError>;

    /// Persist only the status column
    async fn update_activity_status(
        &mut self,
        id: ActivityId,
        status: ActivityStatus,
    ) -> Result<(), RepositoryError>;

    async fn find_activity(&mut self, id: ActivityId) -> Result<Option<Activity>, RepositoryError>;

    /// Find and lock the row for the rest of the unit of work
    async fn lock_activity(&mut self, id: ActivityId) -> Result<Option<Activity>, RepositoryError>;

    async fn list_activities(
        &mut self,
        filter: &ActivityFilter,
    ) -> Result<Vec<Activity>, RepositoryError>;

    /// Delete the activity. Returns `false` when it no longer exists.
    /// Dependent applications and deletion requests keep their snapshot and
    /// lose the live reference; codes and check-ins are removed.
    async fn delete_activity(&mut self, id: ActivityId) -> Result<bool, RepositoryError>;

    /// Atomically increment the reserved-seat counter unless the maximum is
    /// reached.
    async fn try_reserve_seat(
        &mut self,
        id: ActivityId,
    ) -> Result<SeatReservation, RepositoryError>;

    /// Decrement the reserved-seat counter, floored at zero. Returns the new count.
    async fn release_seat(&mut self, id: ActivityId) -> Result<u32, RepositoryError>;

    /// Set-at-a-time status refresh over every auto-managed activity, using
    /// the same priority ordering as `derive_status`.
    async fn refresh_statuses(
        &mut self,
        now: DateTime<Utc>,
        upcoming_window: Duration,
    ) -> Result<Vec<StatusChange>, RepositoryError>;
}

/// Repository interface for Application aggregates
#[async_trait]
pub trait ApplicationRepository: Send {
    /// Fails with `RepositoryError::UniqueViolation` when the student already
    /// holds a non-cancelled application for the activity.
    async fn insert_application(
        &mut self,
        application: &Application,
    ) -> Result<(), RepositoryError>;

    async fn update_application(
        &mut self,
        application: &Application,
    ) -> Result<(), RepositoryError>;

    async fn find_application(
        &mut self,
        id: ApplicationId,
    ) -> Result<Option<Application>, RepositoryError>;

    async fn lock_application(
        &mut self,
        id: ApplicationId,
    ) -> Result<Option<Application>, RepositoryError>;

    /// The student's non-cancelled application for the activity, locked
    async fn find_active_application(
        &mut self,
        activity_id: ActivityId,
        student_id: UserId,
    ) -> Result<Option<Application>, RepositoryError>;

    async fn list_applications(
        &mut self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, RepositoryError>;

    async fn approved_student_ids(
        &mut self,
        activity_id: ActivityId,
    ) -> Result<Vec<UserId>, RepositoryError>;
}

/// Repository interface for check-in codes and attendance records
#[async_trait]
pub trait AttendanceRepository: Send {
    async fn find_check_in_code(
        &mut self,
        activity_id: ActivityId,
        valid_date: NaiveDate,
    ) -> Result<Option<DailyCheckInCode>, RepositoryError>;

    /// Insert unless a code already exists for (activity, date); returns the
    /// code that is stored afterwards, which may be a concurrent winner.
    async fn insert_check_in_code_if_absent(
        &mut self,
        code: &DailyCheckInCode,
    ) -> Result<DailyCheckInCode, RepositoryError>;

    async fn find_student_check_in(
        &mut self,
        activity_id: ActivityId,
        student_id: UserId,
    ) -> Result<Option<StudentCheckIn>, RepositoryError>;

    /// Insert or update keyed on (activity, student)
    async fn upsert_student_check_in(
        &mut self,
        check_in: &StudentCheckIn,
    ) -> Result<StudentCheckIn, RepositoryError>;

    async fn list_student_check_ins(
        &mut self,
        activity_id: ActivityId,
    ) -> Result<Vec<StudentCheckIn>, RepositoryError>;

    /// Insert absent records, skipping students that already have one.
    /// Returns the number of rows created.
    async fn insert_absences(
        &mut self,
        activity_id: ActivityId,
        student_ids: &[UserId],
        marked_at: DateTime<Utc>,
    ) -> Result<usize, RepositoryError>;
}

/// Repository interface for ActivityDeletionRequest aggregates
#[async_trait]
pub trait DeletionRequestRepository: Send {
    async fn insert_deletion_request(
        &mut self,
        request: &ActivityDeletionRequest,
    ) -> Result<(), RepositoryError>;

    async fn update_deletion_request(
        &mut self,
        request: &ActivityDeletionRequest,
    ) -> Result<(), RepositoryError>;

    async fn find_deletion_request(
        &mut self,
        id: DeletionRequestId,
    ) -> Result<Option<ActivityDeletionRequest>, RepositoryError>;

    async fn lock_deletion_request(
        &mut self,
        id: DeletionRequestId,
    ) -> Result<Option<ActivityDeletionRequest>, RepositoryError>;

    async fn list_deletion_requests(
        &mut self,
        status: Option<DeletionRequestStatus>,
    ) -> Result<Vec<ActivityDeletionRequest>, RepositoryError>;
}

/// One transaction spanning every repository
#[async_trait]
pub trait UnitOfWork:
    ActivityRepository
    + ApplicationRepository
    + AttendanceRepository
    + DeletionRequestRepository
    + Send
{
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// Factory for units of work
#[async_trait]
pub trait Database: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return RepositoryError::UniqueViolation(
                    db_err.constraint().unwrap_or("unknown").to_string(),
                );
            }
        }
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
