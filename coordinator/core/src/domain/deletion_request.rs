// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Activity Deletion Request Aggregate
//!
//! Organizers cannot delete an activity that already has reserved seats.
//! They file a request instead, and an admin approves (the activity is then
//! deleted) or rejects it with a note.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::activity::{Activity, ActivityId, ActivitySnapshot};
use crate::domain::actor::UserId;
use crate::domain::error::CoordinatorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeletionRequestId(pub Uuid);

impl DeletionRequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DeletionRequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DeletionRequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletionRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl DeletionRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionRequestStatus::Pending => "pending",
            DeletionRequestStatus::Approved => "approved",
            DeletionRequestStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for DeletionRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeletionRequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeletionRequestStatus::Pending),
            "approved" => Ok(DeletionRequestStatus::Approved),
            "rejected" => Ok(DeletionRequestStatus::Rejected),
            other => Err(format!("unknown deletion request status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Approve,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDeletionRequest {
    pub id: DeletionRequestId,
    /// Live reference; cleared once the activity is gone
    pub activity_id: Option<ActivityId>,
    pub snapshot: ActivitySnapshot,
    pub organization: String,
    pub requested_by: UserId,
    pub reason: String,
    pub status: DeletionRequestStatus,
    pub created_at: DateTime<Utc>,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_note: Option<String>,
}

impl ActivityDeletionRequest {
    pub fn new(
        activity: &Activity,
        requested_by: UserId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, CoordinatorError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CoordinatorError::validation("a reason for deletion is required"));
        }

        Ok(Self {
            id: DeletionRequestId::new(),
            activity_id: Some(activity.id),
            snapshot: activity.snapshot(),
            organization: activity.organization.clone(),
            requested_by,
            reason: reason.to_string(),
            status: DeletionRequestStatus::Pending,
            created_at: now,
            reviewed_by: None,
            reviewed_at: None,
            review_note: None,
        })
    }

    pub fn approve(
        &mut self,
        reviewer: UserId,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), CoordinatorError> {
        self.ensure_pending("approve")?;
        self.status = DeletionRequestStatus::Approved;
        self.reviewed_by = Some(reviewer);
        self.reviewed_at = Some(now);
        self.review_note = note
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        Ok(())
    }

    pub fn reject(
        &mut self,
        reviewer: UserId,
        note: &str,
        now: DateTime<Utc>,
    ) -> Result<(), CoordinatorError> {
        self.ensure_pending("reject")?;
        let note = note.trim();
        if note.is_empty() {
            return Err(CoordinatorError::validation("rejection note (reason) is required"));
        }
        self.status = DeletionRequestStatus::Rejected;
        self.reviewed_by = Some(reviewer);
        self.reviewed_at = Some(now);
        self.review_note = Some(note.to_string());
        Ok(())
    }

    fn ensure_pending(&self, action: &'static str) -> Result<(), CoordinatorError> {
        if self.status != DeletionRequestStatus::Pending {
            return Err(CoordinatorError::invalid_state("deletion request", self.status, action));
        }
        Ok(())
    }
}
