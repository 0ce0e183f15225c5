// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Status Engine - Application Layer
//!
//! Recomputes stored activity statuses from `derive_status` at explicit
//! points: after a mutation inside the mutating workflow's unit of work, on
//! single reads, and in the periodic bulk sweep.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Collaborators:** `Database`, `Clock`, `EventBus`

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::activity::{derive_status, Activity, ActivityId, ActivityStatus};
use crate::domain::clock::Clock;
use crate::domain::error::CoordinatorError;
use crate::domain::events::ActivityEvent;
use crate::domain::repository::{Database, StatusChange, UnitOfWork};
use crate::infrastructure::event_bus::EventBus;

/// Outcome of a bulk status refresh
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSweepReport {
    pub swept_at: Option<DateTime<Utc>>,
    /// Rows moved, keyed by target status
    pub changed: BTreeMap<String, usize>,
}

impl StatusSweepReport {
    fn from_changes(changes: &[StatusChange], now: DateTime<Utc>) -> Self {
        let mut changed = BTreeMap::new();
        for change in changes {
            *changed.entry(change.to.as_str().to_string()).or_insert(0) += 1;
        }
        Self {
            swept_at: Some(now),
            changed,
        }
    }

    pub fn total(&self) -> usize {
        self.changed.values().sum()
    }

    pub fn count(&self, status: ActivityStatus) -> usize {
        self.changed.get(status.as_str()).copied().unwrap_or(0)
    }
}

pub struct StatusEngine {
    database: Arc<dyn Database>,
    clock: Arc<dyn Clock>,
    upcoming_window: Duration,
    event_bus: Arc<EventBus>,
}

impl StatusEngine {
    pub fn new(
        database: Arc<dyn Database>,
        clock: Arc<dyn Clock>,
        upcoming_window: Duration,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            database,
            clock,
            upcoming_window,
            event_bus,
        }
    }

    pub fn upcoming_window(&self) -> Duration {
        self.upcoming_window
    }

    pub fn derive(&self, activity: &Activity, now: DateTime<Utc>) -> ActivityStatus {
        derive_status(activity, now, self.upcoming_window)
    }

    /// Recompute inside the caller's unit of work. Writes only the status
    /// column and only when it changes. The caller publishes the returned
    /// change after committing.
    pub async fn apply(
        &self,
        tx: &mut dyn UnitOfWork,
        activity: &mut Activity,
        now: DateTime<Utc>,
    ) -> Result<Option<StatusChange>, CoordinatorError> {
        let next = self.derive(activity, now);
        if next == activity.status {
            return Ok(None);
        }

        tx.update_activity_status(activity.id, next).await?;
        let change = StatusChange {
            activity_id: activity.id,
            from: activity.status,
            to: next,
        };
        debug!(
            activity_id = %activity.id,
            from = %change.from,
            to = %change.to,
            "Activity status recomputed"
        );
        activity.status = next;
        Ok(Some(change))
    }

    /// Refresh one activity in its own unit of work
    pub async fn refresh(
        &self,
        activity_id: ActivityId,
    ) -> Result<ActivityStatus, CoordinatorError> {
        let now = self.clock.now();
        let mut tx = self.database.begin().await?;
        let mut activity = tx
            .lock_activity(activity_id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("activity", activity_id))?;

        let change = self.apply(tx.as_mut(), &mut activity, now).await?;
        tx.commit().await?;

        if let Some(change) = change {
            self.publish_changes(&[change], now);
        }
        Ok(activity.status)
    }

    /// Bulk set-at-a-time refresh over every auto-managed activity
    pub async fn refresh_all(&self) -> Result<StatusSweepReport, CoordinatorError> {
        let now = self.clock.now();
        let mut tx = self.database.begin().await?;
        let changes = tx.refresh_statuses(now, self.upcoming_window).await?;
        tx.commit().await?;

        let report = StatusSweepReport::from_changes(&changes, now);
        info!(changed = report.total(), "Activity status sweep complete");
        metrics::counter!("volunteer_status_sweeps_total").increment(1);
        metrics::counter!("volunteer_status_transitions_total").increment(changes.len() as u64);

        self.publish_changes(&changes, now);
        Ok(report)
    }

    pub fn publish_changes(&self, changes: &[StatusChange], now: DateTime<Utc>) {
        for change in changes {
            self.event_bus
                .publish_activity_event(ActivityEvent::ActivityStatusChanged {
                    activity_id: change.activity_id,
                    from: change.from,
                    to: change.to,
                    changed_at: now,
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::actor::UserId;
    use crate::domain::clock::FixedClock;
    use crate::infrastructure::event_bus::DomainEvent;
    use crate::infrastructure::repositories::InMemoryDatabase;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()
    }

    fn activity(start_in: Duration, status: ActivityStatus) -> Activity {
        Activity {
            id: ActivityId::new(),
            organizer_id: UserId::new(),
            organization: "Faculty of Science".to_string(),
            title: "Library shelving".to_string(),
            description: String::new(),
            location: "Central library".to_string(),
            categories: vec!["Campus".to_string()],
            start_at: start() + start_in,
            end_at: start() + start_in + Duration::hours(3),
            max_participants: None,
            current_participants: 0,
            status,
            hours_awarded: None,
            rejection_reason: None,
            created_at: start(),
            updated_at: start(),
        }
    }

    async fn engine_with(
        activities: &[Activity],
    ) -> (StatusEngine, Arc<FixedClock>, Arc<InMemoryDatabase>, Arc<EventBus>) {
        let database = Arc::new(InMemoryDatabase::new());
        let mut tx = database.begin().await.unwrap();
        for activity in activities {
            tx.insert_activity(activity).await.unwrap();
        }
        tx.commit().await.unwrap();

        let clock = Arc::new(FixedClock::new(start()));
        let event_bus = Arc::new(EventBus::new(64));
        let engine = StatusEngine::new(
            database.clone(),
            clock.clone(),
            Duration::days(7),
            event_bus.clone(),
        );
        (engine, clock, database, event_bus)
    }

    #[tokio::test]
    async fn test_refresh_moves_open_to_upcoming_when_window_opens() {
        let open = activity(Duration::days(10), ActivityStatus::Open);
        let (engine, clock, _, _) = engine_with(&[open.clone()]).await;

        assert_eq!(engine.refresh(open.id).await.unwrap(), ActivityStatus::Open);

        clock.advance(Duration::days(4));
        assert_eq!(engine.refresh(open.id).await.unwrap(), ActivityStatus::Upcoming);

        // Idempotent
        assert_eq!(engine.refresh(open.id).await.unwrap(), ActivityStatus::Upcoming);
    }

    #[tokio::test]
    async fn test_refresh_unknown_activity() {
        let (engine, _, _, _) = engine_with(&[]).await;
        assert!(matches!(
            engine.refresh(ActivityId::new()).await,
            Err(CoordinatorError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_refresh_all_reports_transitions() {
        let far = activity(Duration::days(30), ActivityStatus::Open);
        let soon = activity(Duration::days(2), ActivityStatus::Open);
        let running = activity(Duration::hours(-1), ActivityStatus::Upcoming);
        let ended = activity(Duration::days(-2), ActivityStatus::During);
        let pending = activity(Duration::days(-2), ActivityStatus::Pending);

        let (engine, _, database, event_bus) =
            engine_with(&[far, soon, running, ended.clone(), pending.clone()]).await;
        let mut receiver = event_bus.subscribe();

        let report = engine.refresh_all().await.unwrap();
        assert_eq!(report.total(), 3);
        assert_eq!(report.count(ActivityStatus::Upcoming), 1);
        assert_eq!(report.count(ActivityStatus::During), 1);
        assert_eq!(report.count(ActivityStatus::Complete), 1);

        let mut tx = database.begin().await.unwrap();
        let stored = tx.find_activity(ended.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ActivityStatus::Complete);
        let stored = tx.find_activity(pending.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ActivityStatus::Pending);
        drop(tx);

        let mut events = 0;
        while let Ok(event) = receiver.try_recv() {
            assert!(matches!(
                event,
                DomainEvent::Activity(ActivityEvent::ActivityStatusChanged { .. })
            ));
            events += 1;
        }
        assert_eq!(events, 3);

        // Second sweep is a no-op
        assert_eq!(engine.refresh_all().await.unwrap().total(), 0);
    }
}
