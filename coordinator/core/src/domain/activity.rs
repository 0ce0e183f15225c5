// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Activity Aggregate
//!
//! An activity is a volunteer offering posted by an organizer. Its status is
//! stored but always derivable from `(stored status, now, seats)` through
//! [`derive_status`]; callers recompute it at explicit points (reads,
//! mutations and the periodic sweep), never from accessors.
//!
//! `current_participants` is the reserved-seat counter. It is written only by
//! the capacity ledger; nothing in this module mutates it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::actor::UserId;
use crate::domain::error::CoordinatorError;
use crate::domain::taxonomy::CategoryTaxonomy;

pub const MAX_TITLE_LENGTH: usize = 255;
pub const MAX_LOCATION_LENGTH: usize = 255;
pub const MAX_ORGANIZATION_LENGTH: usize = 255;

/// Activities starting sooner than this are `Upcoming`
pub const DEFAULT_UPCOMING_WINDOW_DAYS: i64 = 7;

// ============================================================================
// Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActivityId(pub Uuid);

impl ActivityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ActivityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ActivityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    /// Awaiting moderation
    Pending,
    Open,
    /// Starts within the upcoming window
    Upcoming,
    During,
    Full,
    Complete,
    Cancelled,
    Rejected,
}

impl ActivityStatus {
    pub const AUTO_MANAGED: [ActivityStatus; 4] = [
        ActivityStatus::Open,
        ActivityStatus::Upcoming,
        ActivityStatus::During,
        ActivityStatus::Full,
    ];

    /// Statuses the status engine may move an activity out of
    pub fn is_auto_managed(&self) -> bool {
        Self::AUTO_MANAGED.contains(self)
    }

    pub fn accepts_applications(&self) -> bool {
        matches!(self, ActivityStatus::Open | ActivityStatus::Upcoming)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::Pending => "pending",
            ActivityStatus::Open => "open",
            ActivityStatus::Upcoming => "upcoming",
            ActivityStatus::During => "during",
            ActivityStatus::Full => "full",
            ActivityStatus::Complete => "complete",
            ActivityStatus::Cancelled => "cancelled",
            ActivityStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActivityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ActivityStatus::Pending),
            "open" => Ok(ActivityStatus::Open),
            "upcoming" => Ok(ActivityStatus::Upcoming),
            "during" => Ok(ActivityStatus::During),
            "full" => Ok(ActivityStatus::Full),
            "complete" => Ok(ActivityStatus::Complete),
            "cancelled" => Ok(ActivityStatus::Cancelled),
            "rejected" => Ok(ActivityStatus::Rejected),
            other => Err(format!("unknown activity status: {}", other)),
        }
    }
}

/// Where `now` falls relative to an activity's time window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    BeforeStart,
    Within,
    AfterEnd,
}

/// Copy of an activity's identity taken when a dependent record is written,
/// so the record stays meaningful after the activity is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySnapshot {
    pub activity_id: ActivityId,
    pub title: String,
}

impl ActivitySnapshot {
    /// Live values when the activity still exists, the stored copy otherwise.
    pub fn resolve(&self, live: Option<&Activity>) -> ActivitySnapshot {
        match live {
            Some(activity) if activity.id == self.activity_id => activity.snapshot(),
            _ => self.clone(),
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Payload for creating an activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: String,
    pub categories: Vec<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    #[serde(default)]
    pub max_participants: Option<u32>,
    #[serde(default)]
    pub hours_awarded: Option<f64>,
    /// Owning organization when an admin creates the activity; organizers
    /// always post under their own organization.
    #[serde(default)]
    pub organization: Option<String>,
}

/// Partial update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub categories: Option<Vec<String>>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    /// `Some(None)` removes the limit
    pub max_participants: Option<Option<u32>>,
    pub hours_awarded: Option<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ModerationDecision {
    Approve,
    Reject { reason: String },
}

// ============================================================================
// Aggregate
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub organizer_id: UserId,
    pub organization: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub categories: Vec<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub max_participants: Option<u32>,
    pub current_participants: u32,
    pub status: ActivityStatus,
    pub hours_awarded: Option<f64>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Activity {
    /// Create a new activity awaiting moderation.
    pub fn new(
        organizer_id: UserId,
        organization: String,
        draft: ActivityDraft,
        taxonomy: &CategoryTaxonomy,
        now: DateTime<Utc>,
    ) -> Result<Self, CoordinatorError> {
        let organization = organization.trim().to_string();
        if organization.is_empty() || organization.chars().count() > MAX_ORGANIZATION_LENGTH {
            return Err(CoordinatorError::validation(format!(
                "organization must be between 1 and {} characters",
                MAX_ORGANIZATION_LENGTH
            )));
        }

        let title = validate_text("title", &draft.title, MAX_TITLE_LENGTH)?;
        let location = validate_text("location", &draft.location, MAX_LOCATION_LENGTH)?;
        let categories = taxonomy.validate(&draft.categories)?;
        validate_schedule(draft.start_at, draft.end_at)?;
        validate_max_participants(draft.max_participants, 0)?;
        validate_hours(draft.hours_awarded)?;

        Ok(Self {
            id: ActivityId::new(),
            organizer_id,
            organization,
            title,
            description: draft.description,
            location,
            categories,
            start_at: draft.start_at,
            end_at: draft.end_at,
            max_participants: draft.max_participants,
            current_participants: 0,
            status: ActivityStatus::Pending,
            hours_awarded: draft.hours_awarded,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a partial update. The reserved-seat counter and status are
    /// never touched here.
    pub fn apply_patch(
        &mut self,
        patch: ActivityPatch,
        taxonomy: &CategoryTaxonomy,
        now: DateTime<Utc>,
    ) -> Result<(), CoordinatorError> {
        if matches!(self.status, ActivityStatus::Cancelled | ActivityStatus::Rejected) {
            return Err(CoordinatorError::invalid_state("activity", self.status, "update"));
        }

        let title = match patch.title {
            Some(title) => validate_text("title", &title, MAX_TITLE_LENGTH)?,
            None => self.title.clone(),
        };
        let location = match patch.location {
            Some(location) => validate_text("location", &location, MAX_LOCATION_LENGTH)?,
            None => self.location.clone(),
        };
        let categories = match patch.categories {
            Some(categories) => taxonomy.validate(&categories)?,
            None => self.categories.clone(),
        };
        let start_at = patch.start_at.unwrap_or(self.start_at);
        let end_at = patch.end_at.unwrap_or(self.end_at);
        validate_schedule(start_at, end_at)?;

        let max_participants = patch.max_participants.unwrap_or(self.max_participants);
        validate_max_participants(max_participants, self.current_participants)?;

        let hours_awarded = patch.hours_awarded.unwrap_or(self.hours_awarded);
        validate_hours(hours_awarded)?;

        self.title = title;
        self.location = location;
        self.categories = categories;
        self.start_at = start_at;
        self.end_at = end_at;
        self.max_participants = max_participants;
        self.hours_awarded = hours_awarded;
        if let Some(description) = patch.description {
            self.description = description;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Moderation outcome; only pending activities can be moderated.
    pub fn moderate(
        &mut self,
        decision: &ModerationDecision,
        now: DateTime<Utc>,
    ) -> Result<(), CoordinatorError> {
        if self.status != ActivityStatus::Pending {
            return Err(CoordinatorError::invalid_state("activity", self.status, "moderate"));
        }

        match decision {
            ModerationDecision::Approve => {
                self.status = ActivityStatus::Open;
                self.rejection_reason = None;
            }
            ModerationDecision::Reject { reason } => {
                let reason = reason.trim();
                if reason.is_empty() {
                    return Err(CoordinatorError::validation("rejection reason is required"));
                }
                self.status = ActivityStatus::Rejected;
                self.rejection_reason = Some(reason.to_string());
            }
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), CoordinatorError> {
        match self.status {
            ActivityStatus::Cancelled | ActivityStatus::Complete | ActivityStatus::Rejected => {
                Err(CoordinatorError::invalid_state("activity", self.status, "cancel"))
            }
            _ => {
                self.status = ActivityStatus::Cancelled;
                self.updated_at = now;
                Ok(())
            }
        }
    }

    pub fn capacity_reached(&self) -> bool {
        matches!(self.max_participants, Some(max) if self.current_participants >= max)
    }

    pub fn has_reserved_seats(&self) -> bool {
        self.current_participants > 0
    }

    pub fn time_window(&self, now: DateTime<Utc>) -> TimeWindow {
        if now < self.start_at {
            TimeWindow::BeforeStart
        } else if now > self.end_at {
            TimeWindow::AfterEnd
        } else {
            TimeWindow::Within
        }
    }

    pub fn snapshot(&self) -> ActivitySnapshot {
        ActivitySnapshot {
            activity_id: self.id,
            title: self.title.clone(),
        }
    }
}

/// Status an activity should be in at `now`.
///
/// Priority: Complete, then Full, then During, then Upcoming, then Open.
/// Statuses outside the auto-managed set are returned unchanged.
pub fn derive_status(
    activity: &Activity,
    now: DateTime<Utc>,
    upcoming_window: Duration,
) -> ActivityStatus {
    if !activity.status.is_auto_managed() {
        return activity.status;
    }

    if now > activity.end_at {
        ActivityStatus::Complete
    } else if activity.capacity_reached() {
        ActivityStatus::Full
    } else if activity.start_at <= now {
        ActivityStatus::During
    } else if activity.start_at - now < upcoming_window {
        ActivityStatus::Upcoming
    } else {
        ActivityStatus::Open
    }
}

fn validate_text(field: &str, value: &str, max: usize) -> Result<String, CoordinatorError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CoordinatorError::validation(format!("{} is required", field)));
    }
    if value.chars().count() > max {
        return Err(CoordinatorError::validation(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(value.to_string())
}

fn validate_schedule(
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
) -> Result<(), CoordinatorError> {
    if start_at >= end_at {
        return Err(CoordinatorError::validation("start time must be before end time"));
    }
    Ok(())
}

fn validate_max_participants(max: Option<u32>, reserved: u32) -> Result<(), CoordinatorError> {
    match max {
        Some(0) => Err(CoordinatorError::validation(
            "max participants must be a positive number",
        )),
        Some(max) if max < reserved => Err(CoordinatorError::validation(format!(
            "max participants cannot be lower than the {} seats already reserved",
            reserved
        ))),
        _ => Ok(()),
    }
}

fn validate_hours(hours: Option<f64>) -> Result<(), CoordinatorError> {
    match hours {
        Some(h) if !h.is_finite() || h < 0.0 => Err(CoordinatorError::validation(
            "hours awarded must be a non-negative number",
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap()
    }

    fn taxonomy() -> CategoryTaxonomy {
        CategoryTaxonomy::flat(["Campus", "Community"])
    }

    fn draft(start_in: Duration, length: Duration) -> ActivityDraft {
        ActivityDraft {
            title: "Beach cleanup".to_string(),
            description: "Bring gloves".to_string(),
            location: "Bang Saen".to_string(),
            categories: vec!["Community".to_string()],
            start_at: now() + start_in,
            end_at: now() + start_in + length,
            max_participants: Some(2),
            hours_awarded: Some(3.0),
            organization: None,
        }
    }

    fn open_activity(start_in: Duration, length: Duration) -> Activity {
        let mut activity = Activity::new(
            UserId::new(),
            "Faculty of Science".to_string(),
            draft(start_in, length),
            &taxonomy(),
            now(),
        )
        .unwrap();
        activity.status = ActivityStatus::Open;
        activity
    }

    fn window() -> Duration {
        Duration::days(DEFAULT_UPCOMING_WINDOW_DAYS)
    }

    #[test]
    fn test_new_activity_is_pending_with_no_seats() {
        let activity = Activity::new(
            UserId::new(),
            "Faculty of Science".to_string(),
            draft(Duration::days(10), Duration::hours(2)),
            &taxonomy(),
            now(),
        )
        .unwrap();
        assert_eq!(activity.status, ActivityStatus::Pending);
        assert_eq!(activity.current_participants, 0);
        assert!(activity.rejection_reason.is_none());
    }

    #[test]
    fn test_new_activity_validation() {
        let mut bad_times = draft(Duration::days(1), Duration::hours(2));
        bad_times.end_at = bad_times.start_at;
        let err = Activity::new(UserId::new(), "Org".into(), bad_times, &taxonomy(), now())
            .unwrap_err();
        assert!(err.to_string().contains("start time must be before end time"));

        let mut zero_seats = draft(Duration::days(1), Duration::hours(2));
        zero_seats.max_participants = Some(0);
        assert!(
            Activity::new(UserId::new(), "Org".into(), zero_seats, &taxonomy(), now()).is_err()
        );

        let mut negative_hours = draft(Duration::days(1), Duration::hours(2));
        negative_hours.hours_awarded = Some(-1.0);
        assert!(
            Activity::new(UserId::new(), "Org".into(), negative_hours, &taxonomy(), now()).is_err()
        );

        let mut long_title = draft(Duration::days(1), Duration::hours(2));
        long_title.title = "x".repeat(MAX_TITLE_LENGTH + 1);
        assert!(
            Activity::new(UserId::new(), "Org".into(), long_title, &taxonomy(), now()).is_err()
        );

        let mut bad_category = draft(Duration::days(1), Duration::hours(2));
        bad_category.categories = vec!["Unknown".to_string()];
        assert!(
            Activity::new(UserId::new(), "Org".into(), bad_category, &taxonomy(), now()).is_err()
        );
    }

    #[test]
    fn test_derive_status_priority() {
        // Far future: open
        let activity = open_activity(Duration::days(30), Duration::hours(2));
        assert_eq!(derive_status(&activity, now(), window()), ActivityStatus::Open);

        // Inside upcoming window
        let activity = open_activity(Duration::days(3), Duration::hours(2));
        assert_eq!(derive_status(&activity, now(), window()), ActivityStatus::Upcoming);

        // Running
        let activity = open_activity(Duration::hours(-1), Duration::hours(2));
        assert_eq!(derive_status(&activity, now(), window()), ActivityStatus::During);

        // Ended beats full
        let mut activity = open_activity(Duration::hours(-3), Duration::hours(2));
        activity.current_participants = 2;
        assert_eq!(derive_status(&activity, now(), window()), ActivityStatus::Complete);

        // Full beats time-based states
        let mut activity = open_activity(Duration::hours(-1), Duration::hours(2));
        activity.current_participants = 2;
        assert_eq!(derive_status(&activity, now(), window()), ActivityStatus::Full);
    }

    #[test]
    fn test_derive_status_window_boundaries() {
        // Exactly at start counts as during
        let activity = open_activity(Duration::zero(), Duration::hours(2));
        assert_eq!(derive_status(&activity, now(), window()), ActivityStatus::During);

        // Exactly at end is still during
        let activity = open_activity(Duration::hours(-2), Duration::hours(2));
        assert_eq!(derive_status(&activity, now(), window()), ActivityStatus::During);

        // Exactly seven days out is not yet upcoming
        let activity = open_activity(Duration::days(7), Duration::hours(2));
        assert_eq!(derive_status(&activity, now(), window()), ActivityStatus::Open);
    }

    #[test]
    fn test_full_returns_to_time_state_when_seat_frees() {
        let mut activity = open_activity(Duration::days(3), Duration::hours(2));
        activity.status = ActivityStatus::Full;
        activity.current_participants = 1;
        assert_eq!(derive_status(&activity, now(), window()), ActivityStatus::Upcoming);
    }

    #[test]
    fn test_derive_status_leaves_terminal_states_alone() {
        for status in [
            ActivityStatus::Pending,
            ActivityStatus::Cancelled,
            ActivityStatus::Rejected,
            ActivityStatus::Complete,
        ] {
            let mut activity = open_activity(Duration::hours(-5), Duration::hours(2));
            activity.status = status;
            assert_eq!(derive_status(&activity, now(), window()), status);
        }
    }

    #[test]
    fn test_moderation_only_from_pending() {
        let mut activity = Activity::new(
            UserId::new(),
            "Org".into(),
            draft(Duration::days(10), Duration::hours(2)),
            &taxonomy(),
            now(),
        )
        .unwrap();

        let reject = ModerationDecision::Reject { reason: "  ".to_string() };
        assert!(matches!(
            activity.moderate(&reject, now()),
            Err(CoordinatorError::Validation(_))
        ));

        activity.moderate(&ModerationDecision::Approve, now()).unwrap();
        assert_eq!(activity.status, ActivityStatus::Open);
        assert!(matches!(
            activity.moderate(&ModerationDecision::Approve, now()),
            Err(CoordinatorError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_patch_cannot_shrink_below_reserved_seats() {
        let mut activity = open_activity(Duration::days(10), Duration::hours(2));
        activity.current_participants = 2;

        let patch = ActivityPatch {
            max_participants: Some(Some(1)),
            ..Default::default()
        };
        assert!(activity.apply_patch(patch, &taxonomy(), now()).is_err());

        let patch = ActivityPatch {
            max_participants: Some(None),
            title: Some("Beach cleanup (extended)".to_string()),
            ..Default::default()
        };
        activity.apply_patch(patch, &taxonomy(), now()).unwrap();
        assert_eq!(activity.max_participants, None);
        assert_eq!(activity.current_participants, 2);
        assert_eq!(activity.title, "Beach cleanup (extended)");
    }

    #[test]
    fn test_snapshot_prefers_live_activity() {
        let mut activity = open_activity(Duration::days(10), Duration::hours(2));
        let snapshot = activity.snapshot();
        activity.title = "Renamed".to_string();

        assert_eq!(snapshot.resolve(Some(&activity)).title, "Renamed");
        assert_eq!(snapshot.resolve(None).title, "Beach cleanup");
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            ActivityStatus::Pending,
            ActivityStatus::Open,
            ActivityStatus::Upcoming,
            ActivityStatus::During,
            ActivityStatus::Full,
            ActivityStatus::Complete,
            ActivityStatus::Cancelled,
            ActivityStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<ActivityStatus>().unwrap(), status);
        }
        assert!("archived".parse::<ActivityStatus>().is_err());
    }
}
