// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::activity::{ActivityId, ActivityStatus};
use crate::domain::actor::UserId;
use crate::domain::application::ApplicationId;
use crate::domain::deletion_request::DeletionRequestId;

/// Activity lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ActivityEvent {
    ActivityCreated {
        activity_id: ActivityId,
        organizer_id: UserId,
        created_at: DateTime<Utc>,
    },
    ActivityUpdated {
        activity_id: ActivityId,
        updated_by: UserId,
        updated_at: DateTime<Utc>,
    },
    ActivityModerated {
        activity_id: ActivityId,
        moderator_id: UserId,
        status: ActivityStatus,
        moderated_at: DateTime<Utc>,
    },
    ActivityStatusChanged {
        activity_id: ActivityId,
        from: ActivityStatus,
        to: ActivityStatus,
        changed_at: DateTime<Utc>,
    },
    ActivityDeleted {
        activity_id: ActivityId,
        deleted_by: UserId,
        deleted_at: DateTime<Utc>,
    },
}

/// Application workflow events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ApplicationEvent {
    ApplicationSubmitted {
        application_id: ApplicationId,
        activity_id: ActivityId,
        student_id: UserId,
        submitted_at: DateTime<Utc>,
    },
    ApplicationApproved {
        application_id: ApplicationId,
        activity_id: ActivityId,
        reviewer_id: UserId,
        current_participants: u32,
        approved_at: DateTime<Utc>,
    },
    ApplicationRejected {
        application_id: ApplicationId,
        activity_id: Option<ActivityId>,
        reviewer_id: UserId,
        reason: String,
        rejected_at: DateTime<Utc>,
    },
    ApplicationCancelled {
        application_id: ApplicationId,
        activity_id: Option<ActivityId>,
        seat_released: bool,
        cancelled_at: DateTime<Utc>,
    },
}

/// Check-in code and attendance events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AttendanceEvent {
    CheckInCodeIssued {
        activity_id: ActivityId,
        valid_date: NaiveDate,
        issued_at: DateTime<Utc>,
    },
    StudentCheckedIn {
        activity_id: ActivityId,
        student_id: UserId,
        checked_in_at: DateTime<Utc>,
    },
    StudentsMarkedAbsent {
        activity_id: ActivityId,
        count: usize,
        marked_at: DateTime<Utc>,
    },
}

/// Deletion request events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeletionRequestEvent {
    DeletionRequested {
        request_id: DeletionRequestId,
        activity_id: ActivityId,
        requested_by: UserId,
        requested_at: DateTime<Utc>,
    },
    DeletionRequestApproved {
        request_id: DeletionRequestId,
        activity_id: Option<ActivityId>,
        reviewer_id: UserId,
        reviewed_at: DateTime<Utc>,
    },
    DeletionRequestRejected {
        request_id: DeletionRequestId,
        reviewer_id: UserId,
        reviewed_at: DateTime<Utc>,
    },
}
