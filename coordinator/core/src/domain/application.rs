// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application Aggregate
//!
//! A student's request to join one activity. Capacity is tied to this record:
//! every transition into `Approved` reserves exactly one seat and every
//! transition out of `Approved` releases exactly one. The seat bookkeeping
//! itself lives in the capacity ledger; this module only guards the state
//! machine.
//!
//! ```text
//! Pending ──approve──▶ Approved ──cancel──▶ Cancelled
//!    │                                          ▲
//!    ├──reject──▶ Rejected                      │
//!    └──────────────cancel──────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::activity::{Activity, ActivityId, ActivitySnapshot};
use crate::domain::actor::UserId;
use crate::domain::error::CoordinatorError;

/// Maximum length of a rejection note
pub const MAX_NOTE_LENGTH: usize = 225;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub Uuid);

impl ApplicationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ApplicationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApplicationStatus::Pending),
            "approved" => Ok(ApplicationStatus::Approved),
            "rejected" => Ok(ApplicationStatus::Rejected),
            "cancelled" => Ok(ApplicationStatus::Cancelled),
            other => Err(format!("unknown application status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    /// Live reference; cleared when the activity is deleted
    pub activity_id: Option<ActivityId>,
    pub student_id: UserId,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
    pub decision_at: Option<DateTime<Utc>>,
    pub decision_by: Option<UserId>,
    /// Rejection reason
    pub notes: Option<String>,
    pub snapshot: ActivitySnapshot,
}

impl Application {
    pub fn new(activity: &Activity, student_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: ApplicationId::new(),
            activity_id: Some(activity.id),
            student_id,
            status: ApplicationStatus::Pending,
            applied_at: now,
            decision_at: None,
            decision_by: None,
            notes: None,
            snapshot: activity.snapshot(),
        }
    }

    /// Only cancelled applications free the student to apply again.
    pub fn blocks_reapplication(&self) -> bool {
        matches!(
            self.status,
            ApplicationStatus::Pending | ApplicationStatus::Approved | ApplicationStatus::Rejected
        )
    }

    pub fn ensure_pending(&self, action: &'static str) -> Result<(), CoordinatorError> {
        if self.status != ApplicationStatus::Pending {
            return Err(CoordinatorError::invalid_state("application", self.status, action));
        }
        Ok(())
    }

    /// Mark approved. The caller must already hold the reserved seat.
    pub fn approve(
        &mut self,
        reviewer: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), CoordinatorError> {
        self.ensure_pending("approve")?;
        self.status = ApplicationStatus::Approved;
        self.decision_at = Some(now);
        self.decision_by = Some(reviewer);
        self.notes = None;
        Ok(())
    }

    pub fn reject(
        &mut self,
        reviewer: UserId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), CoordinatorError> {
        self.ensure_pending("reject")?;
        let reason = validate_note(reason)?;
        self.status = ApplicationStatus::Rejected;
        self.decision_at = Some(now);
        self.decision_by = Some(reviewer);
        self.notes = Some(reason);
        Ok(())
    }

    /// Withdraw the application, returning the status it was withdrawn from
    /// so the caller knows whether a seat has to be released.
    pub fn cancel(&mut self) -> Result<ApplicationStatus, CoordinatorError> {
        match self.status {
            ApplicationStatus::Pending | ApplicationStatus::Approved => {
                let previous = self.status;
                self.status = ApplicationStatus::Cancelled;
                Ok(previous)
            }
            status => Err(CoordinatorError::invalid_state("application", status, "cancel")),
        }
    }
}

fn validate_note(reason: &str) -> Result<String, CoordinatorError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(CoordinatorError::validation("rejection reason is required"));
    }
    if reason.chars().count() > MAX_NOTE_LENGTH {
        return Err(CoordinatorError::validation(format!(
            "rejection reason must be at most {} characters",
            MAX_NOTE_LENGTH
        )));
    }
    Ok(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::activity::ActivityStatus;
    use chrono::{Duration, TimeZone};

    fn activity() -> Activity {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        Activity {
            id: ActivityId::new(),
            organizer_id: UserId::new(),
            organization: "Faculty of Science".to_string(),
            title: "Tree planting".to_string(),
            description: String::new(),
            location: "North campus".to_string(),
            categories: vec!["Campus".to_string()],
            start_at: now + Duration::days(10),
            end_at: now + Duration::days(10) + Duration::hours(3),
            max_participants: Some(10),
            current_participants: 0,
            status: ActivityStatus::Open,
            hours_awarded: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_new_application_snapshots_activity() {
        let activity = activity();
        let application = Application::new(&activity, UserId::new(), Utc::now());
        assert_eq!(application.status, ApplicationStatus::Pending);
        assert_eq!(application.activity_id, Some(activity.id));
        assert_eq!(application.snapshot.title, "Tree planting");
    }

    #[test]
    fn test_approve_records_decision_and_clears_notes() {
        let mut application = Application::new(&activity(), UserId::new(), Utc::now());
        application.notes = Some("stale".to_string());
        let reviewer = UserId::new();

        application.approve(reviewer, Utc::now()).unwrap();
        assert_eq!(application.status, ApplicationStatus::Approved);
        assert_eq!(application.decision_by, Some(reviewer));
        assert!(application.decision_at.is_some());
        assert!(application.notes.is_none());

        assert!(matches!(
            application.approve(reviewer, Utc::now()),
            Err(CoordinatorError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_reject_requires_bounded_reason() {
        let mut application = Application::new(&activity(), UserId::new(), Utc::now());

        assert!(matches!(
            application.reject(UserId::new(), "   ", Utc::now()),
            Err(CoordinatorError::Validation(_))
        ));
        let too_long = "x".repeat(MAX_NOTE_LENGTH + 1);
        assert!(matches!(
            application.reject(UserId::new(), &too_long, Utc::now()),
            Err(CoordinatorError::Validation(_))
        ));
        assert_eq!(application.status, ApplicationStatus::Pending);

        let at_limit = "y".repeat(MAX_NOTE_LENGTH);
        application.reject(UserId::new(), &at_limit, Utc::now()).unwrap();
        assert_eq!(application.status, ApplicationStatus::Rejected);
        assert_eq!(application.notes.as_deref(), Some(at_limit.as_str()));
    }

    #[test]
    fn test_cancel_reports_previous_status() {
        let mut pending = Application::new(&activity(), UserId::new(), Utc::now());
        assert_eq!(pending.cancel().unwrap(), ApplicationStatus::Pending);

        let mut approved = Application::new(&activity(), UserId::new(), Utc::now());
        approved.approve(UserId::new(), Utc::now()).unwrap();
        assert_eq!(approved.cancel().unwrap(), ApplicationStatus::Approved);
        assert_eq!(approved.status, ApplicationStatus::Cancelled);
    }

    #[test]
    fn test_terminal_states_never_reopen() {
        let mut application = Application::new(&activity(), UserId::new(), Utc::now());
        application.reject(UserId::new(), "Schedule conflict", Utc::now()).unwrap();
        assert!(application.cancel().is_err());
        assert!(application.approve(UserId::new(), Utc::now()).is_err());

        let mut cancelled = Application::new(&activity(), UserId::new(), Utc::now());
        cancelled.cancel().unwrap();
        assert!(cancelled.cancel().is_err());
        assert!(!cancelled.blocks_reapplication());
        assert!(application.blocks_reapplication());
    }
}
