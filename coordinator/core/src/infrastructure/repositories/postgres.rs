// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Unit of Work
//!
//! One `sqlx` transaction implementing every repository trait. The
//! per-aggregate query code lives in the sibling `postgres_*` modules as
//! further `impl` blocks on [`PostgresUnitOfWork`].
//!
//! Dropping the unit of work without committing rolls the transaction back.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::activity::{Activity, ActivityId, ActivitySnapshot, ActivityStatus};
use crate::domain::actor::UserId;
use crate::domain::application::{Application, ApplicationId, ApplicationStatus};
use crate::domain::check_in::{
    AttendanceStatus, CheckInCode, CheckInId, DailyCheckInCode, StudentCheckIn,
};
use crate::domain::deletion_request::{
    ActivityDeletionRequest, DeletionRequestId, DeletionRequestStatus,
};
use crate::domain::repository::{RepositoryError, UnitOfWork};

pub struct PostgresUnitOfWork {
    pub(super) tx: Transaction<'static, Postgres>,
}

impl PostgresUnitOfWork {
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let uow = *self;
        uow.tx.commit().await?;
        Ok(())
    }
}

// ============================================================================
// Row mapping
// ============================================================================

pub(super) const ACTIVITY_COLUMNS: &str = "id, organizer_id, organization, title, description, \
     location, categories, start_at, end_at, max_participants, current_participants, status, \
     hours_awarded, rejection_reason, created_at, updated_at";

pub(super) const APPLICATION_COLUMNS: &str = "id, activity_id, student_id, status, applied_at, \
     decision_at, decision_by, notes, snapshot_activity_id, snapshot_title";

pub(super) const CHECK_IN_COLUMNS: &str =
    "id, activity_id, student_id, attendance_status, checked_in_at, marked_absent_at";

pub(super) const DELETION_REQUEST_COLUMNS: &str = "id, activity_id, snapshot_activity_id, \
     snapshot_title, organization, requested_by, reason, status, created_at, reviewed_by, \
     reviewed_at, review_note";

pub(super) fn to_db_count(value: u32) -> Result<i32, RepositoryError> {
    i32::try_from(value).map_err(|_| {
        RepositoryError::Serialization(format!("count {} exceeds INTEGER range", value))
    })
}

fn from_db_count(value: i32) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Serialization(format!("negative count in database: {}", value))
    })
}

fn parse_status<T>(raw: &str) -> Result<T, RepositoryError>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse::<T>().map_err(RepositoryError::Serialization)
}

pub(super) fn parse_activity_row(row: &PgRow) -> Result<Activity, RepositoryError> {
    let status: String = row.try_get("status")?;
    let max_participants: Option<i32> = row.try_get("max_participants")?;
    let current_participants: i32 = row.try_get("current_participants")?;

    Ok(Activity {
        id: ActivityId(row.try_get("id")?),
        organizer_id: UserId(row.try_get("organizer_id")?),
        organization: row.try_get("organization")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        location: row.try_get("location")?,
        categories: row.try_get("categories")?,
        start_at: row.try_get("start_at")?,
        end_at: row.try_get("end_at")?,
        max_participants: max_participants.map(from_db_count).transpose()?,
        current_participants: from_db_count(current_participants)?,
        status: parse_status::<ActivityStatus>(&status)?,
        hours_awarded: row.try_get("hours_awarded")?,
        rejection_reason: row.try_get("rejection_reason")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub(super) fn parse_application_row(row: &PgRow) -> Result<Application, RepositoryError> {
    let status: String = row.try_get("status")?;
    let activity_id: Option<Uuid> = row.try_get("activity_id")?;
    let decision_by: Option<Uuid> = row.try_get("decision_by")?;

    Ok(Application {
        id: ApplicationId(row.try_get("id")?),
        activity_id: activity_id.map(ActivityId),
        student_id: UserId(row.try_get("student_id")?),
        status: parse_status::<ApplicationStatus>(&status)?,
        applied_at: row.try_get("applied_at")?,
        decision_at: row.try_get("decision_at")?,
        decision_by: decision_by.map(UserId),
        notes: row.try_get("notes")?,
        snapshot: ActivitySnapshot {
            activity_id: ActivityId(row.try_get("snapshot_activity_id")?),
            title: row.try_get("snapshot_title")?,
        },
    })
}

pub(super) fn parse_check_in_code_row(row: &PgRow) -> Result<DailyCheckInCode, RepositoryError> {
    let code: String = row.try_get("code")?;
    let code = CheckInCode::parse(&code)
        .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

    Ok(DailyCheckInCode {
        id: row.try_get("id")?,
        activity_id: ActivityId(row.try_get("activity_id")?),
        code,
        valid_date: row.try_get("valid_date")?,
        created_at: row.try_get("created_at")?,
    })
}

pub(super) fn parse_check_in_row(row: &PgRow) -> Result<StudentCheckIn, RepositoryError> {
    let status: String = row.try_get("attendance_status")?;

    Ok(StudentCheckIn {
        id: CheckInId(row.try_get("id")?),
        activity_id: ActivityId(row.try_get("activity_id")?),
        student_id: UserId(row.try_get("student_id")?),
        attendance_status: parse_status::<AttendanceStatus>(&status)?,
        checked_in_at: row.try_get("checked_in_at")?,
        marked_absent_at: row.try_get("marked_absent_at")?,
    })
}

pub(super) fn parse_deletion_request_row(
    row: &PgRow,
) -> Result<ActivityDeletionRequest, RepositoryError> {
    let status: String = row.try_get("status")?;
    let activity_id: Option<Uuid> = row.try_get("activity_id")?;
    let reviewed_by: Option<Uuid> = row.try_get("reviewed_by")?;

    Ok(ActivityDeletionRequest {
        id: DeletionRequestId(row.try_get("id")?),
        activity_id: activity_id.map(ActivityId),
        snapshot: ActivitySnapshot {
            activity_id: ActivityId(row.try_get("snapshot_activity_id")?),
            title: row.try_get("snapshot_title")?,
        },
        organization: row.try_get("organization")?,
        requested_by: UserId(row.try_get("requested_by")?),
        reason: row.try_get("reason")?,
        status: parse_status::<DeletionRequestStatus>(&status)?,
        created_at: row.try_get("created_at")?,
        reviewed_by: reviewed_by.map(UserId),
        reviewed_at: row.try_get("reviewed_at")?,
        review_note: row.try_get("review_note")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_conversions() {
        assert_eq!(to_db_count(12).unwrap(), 12);
        assert!(to_db_count(u32::MAX).is_err());
        assert_eq!(from_db_count(3).unwrap(), 3);
        assert!(from_db_count(-1).is_err());
    }

    #[test]
    fn test_unknown_status_is_serialization_error() {
        let err = parse_status::<ActivityStatus>("archived").unwrap_err();
        assert!(matches!(err, RepositoryError::Serialization(_)));
    }
}
