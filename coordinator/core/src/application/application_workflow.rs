// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application Workflow - Application Layer
//!
//! Students apply to activities; organizers of the owning organization (or
//! admins) approve or reject; students may withdraw. Approval reserves a
//! seat through the [`CapacityLedger`] in the same unit of work, so a failed
//! reservation leaves the application pending and the counter untouched.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Collaborators:** `Database`, `CapacityLedger`, `StatusEngine`, `EventBus`

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::capacity_ledger::CapacityLedger;
use crate::application::status_engine::StatusEngine;
use crate::domain::activity::{Activity, ActivityId, ActivitySnapshot, ActivityStatus};
use crate::domain::actor::{Actor, Role};
use crate::domain::application::{Application, ApplicationId, ApplicationStatus};
use crate::domain::clock::Clock;
use crate::domain::error::CoordinatorError;
use crate::domain::events::ApplicationEvent;
use crate::domain::repository::{
    ActivityFilter, ApplicationFilter, Database, RepositoryError, StatusChange, UnitOfWork,
};
use crate::infrastructure::event_bus::EventBus;

/// An application together with the activity identity it refers to,
/// resolved from the live activity when it still exists.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    #[serde(flatten)]
    pub application: Application,
    pub activity: ActivitySnapshot,
    /// `None` once the activity has been deleted
    pub activity_status: Option<ActivityStatus>,
}

impl ApplicationView {
    fn new(application: Application, live: Option<&Activity>) -> Self {
        let activity = application.snapshot.resolve(live);
        Self {
            activity_status: live.map(|a| a.status),
            activity,
            application,
        }
    }
}

#[async_trait]
pub trait ApplicationService: Send + Sync {
    /// Apply to an open activity as a student
    async fn submit(
        &self,
        actor: &Actor,
        activity_id: ActivityId,
    ) -> Result<Application, CoordinatorError>;

    /// Approve a pending application, reserving one seat
    async fn approve(
        &self,
        reviewer: &Actor,
        id: ApplicationId,
    ) -> Result<Application, CoordinatorError>;

    async fn reject(
        &self,
        reviewer: &Actor,
        id: ApplicationId,
        reason: &str,
    ) -> Result<Application, CoordinatorError>;

    /// Withdraw one's own application; an approved one gives its seat back
    async fn cancel(
        &self,
        actor: &Actor,
        id: ApplicationId,
    ) -> Result<Application, CoordinatorError>;

    async fn get(
        &self,
        actor: &Actor,
        id: ApplicationId,
    ) -> Result<ApplicationView, CoordinatorError>;

    /// Applications visible to the actor: a student's own, an organizer's
    /// organization's, or every application for admins
    async fn list(
        &self,
        actor: &Actor,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationView>, CoordinatorError>;

    async fn list_for_activity(
        &self,
        actor: &Actor,
        activity_id: ActivityId,
    ) -> Result<Vec<ApplicationView>, CoordinatorError>;

    /// Activities the student holds an approved application for
    async fn approved_activities(
        &self,
        student: &Actor,
    ) -> Result<Vec<Activity>, CoordinatorError>;
}

pub struct StandardApplicationService {
    database: Arc<dyn Database>,
    clock: Arc<dyn Clock>,
    ledger: CapacityLedger,
    status_engine: Arc<StatusEngine>,
    event_bus: Arc<EventBus>,
}

impl StandardApplicationService {
    pub fn new(
        database: Arc<dyn Database>,
        clock: Arc<dyn Clock>,
        status_engine: Arc<StatusEngine>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            database,
            clock,
            ledger: CapacityLedger::new(),
            status_engine,
            event_bus,
        }
    }

    async fn lock_application(
        tx: &mut dyn UnitOfWork,
        id: ApplicationId,
    ) -> Result<Application, CoordinatorError> {
        tx.lock_application(id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("application", id))
    }

    async fn lock_activity(
        tx: &mut dyn UnitOfWork,
        id: ActivityId,
    ) -> Result<Activity, CoordinatorError> {
        tx.lock_activity(id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("activity", id))
    }

    /// Lock the application's activity, then the application. Deleting an
    /// activity rewrites its applications through the foreign key, so the
    /// activity row is always taken first. `None` when the activity is gone.
    async fn lock_with_activity(
        tx: &mut dyn UnitOfWork,
        id: ApplicationId,
    ) -> Result<(Application, Option<Activity>), CoordinatorError> {
        let unlocked = tx
            .find_application(id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("application", id))?;
        let activity = match unlocked.activity_id {
            Some(activity_id) => tx.lock_activity(activity_id).await?,
            None => None,
        };
        let application = Self::lock_application(tx, id).await?;
        let activity = activity.filter(|a| application.activity_id == Some(a.id));
        Ok((application, activity))
    }

    /// Live activities for a batch of applications, keyed by id
    async fn live_activities(
        tx: &mut dyn UnitOfWork,
        applications: &[Application],
    ) -> Result<HashMap<ActivityId, Activity>, CoordinatorError> {
        let mut ids: Vec<ActivityId> = applications.iter().filter_map(|a| a.activity_id).collect();
        ids.sort();
        ids.dedup();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let filter = ActivityFilter {
            ids: Some(ids),
            ..Default::default()
        };
        Ok(tx
            .list_activities(&filter)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect())
    }

    async fn views(
        tx: &mut dyn UnitOfWork,
        applications: Vec<Application>,
    ) -> Result<Vec<ApplicationView>, CoordinatorError> {
        let live = Self::live_activities(tx, &applications).await?;
        Ok(applications
            .into_iter()
            .map(|application| {
                let activity = application.activity_id.and_then(|id| live.get(&id));
                ApplicationView::new(application, activity)
            })
            .collect())
    }

    fn publish_status_change(
        &self,
        change: Option<StatusChange>,
        now: chrono::DateTime<chrono::Utc>,
    ) {
        if let Some(change) = change {
            self.status_engine.publish_changes(&[change], now);
        }
    }
}

#[async_trait]
impl ApplicationService for StandardApplicationService {
    async fn submit(
        &self,
        actor: &Actor,
        activity_id: ActivityId,
    ) -> Result<Application, CoordinatorError> {
        actor.require_student()?;
        let now = self.clock.now();

        let mut tx = self.database.begin().await?;
        let mut activity = Self::lock_activity(tx.as_mut(), activity_id).await?;
        let change = self.status_engine.apply(tx.as_mut(), &mut activity, now).await?;

        match activity.status {
            status if status.accepts_applications() => {}
            ActivityStatus::Full => return Err(CoordinatorError::CapacityExceeded(activity_id)),
            status => return Err(CoordinatorError::NotOpen(status)),
        }
        if activity.capacity_reached() {
            return Err(CoordinatorError::CapacityExceeded(activity_id));
        }

        let duplicate = CoordinatorError::DuplicateApplication {
            activity: activity_id,
            student: actor.user_id,
        };
        if tx.find_active_application(activity_id, actor.user_id).await?.is_some() {
            return Err(duplicate);
        }

        let application = Application::new(&activity, actor.user_id, now);
        match tx.insert_application(&application).await {
            Ok(()) => {}
            Err(RepositoryError::UniqueViolation(_)) => return Err(duplicate),
            Err(e) => return Err(e.into()),
        }
        tx.commit().await?;

        info!(
            application_id = %application.id,
            activity_id = %activity_id,
            student_id = %actor.user_id,
            "Application submitted"
        );
        metrics::counter!("volunteer_applications_submitted_total").increment(1);
        self.publish_status_change(change, now);
        self.event_bus.publish_application_event(ApplicationEvent::ApplicationSubmitted {
            application_id: application.id,
            activity_id,
            student_id: actor.user_id,
            submitted_at: now,
        });
        Ok(application)
    }

    async fn approve(
        &self,
        reviewer: &Actor,
        id: ApplicationId,
    ) -> Result<Application, CoordinatorError> {
        let now = self.clock.now();
        let mut tx = self.database.begin().await?;

        let (mut application, activity) = Self::lock_with_activity(tx.as_mut(), id).await?;
        let mut activity = activity.ok_or_else(|| {
            CoordinatorError::not_found("activity", application.snapshot.activity_id)
        })?;
        let activity_id = activity.id;

        reviewer.require_manager_of(&activity.organization)?;
        application.ensure_pending("approve")?;

        // Early return drops the unit of work; nothing is reserved
        let reserved = self.ledger.reserve(tx.as_mut(), activity_id).await?;
        application.approve(reviewer.user_id, now)?;
        tx.update_application(&application).await?;

        activity.current_participants = reserved;
        let change = self.status_engine.apply(tx.as_mut(), &mut activity, now).await?;
        tx.commit().await?;

        info!(
            application_id = %id,
            activity_id = %activity_id,
            reviewer_id = %reviewer.user_id,
            reserved,
            "Application approved"
        );
        metrics::counter!("volunteer_applications_approved_total").increment(1);
        self.publish_status_change(change, now);
        self.event_bus.publish_application_event(ApplicationEvent::ApplicationApproved {
            application_id: id,
            activity_id,
            reviewer_id: reviewer.user_id,
            current_participants: reserved,
            approved_at: now,
        });
        Ok(application)
    }

    async fn reject(
        &self,
        reviewer: &Actor,
        id: ApplicationId,
        reason: &str,
    ) -> Result<Application, CoordinatorError> {
        let now = self.clock.now();
        let mut tx = self.database.begin().await?;

        let (mut application, activity) = Self::lock_with_activity(tx.as_mut(), id).await?;
        match &activity {
            Some(activity) => reviewer.require_manager_of(&activity.organization)?,
            None => reviewer.require_admin()?,
        }

        application.reject(reviewer.user_id, reason, now)?;
        tx.update_application(&application).await?;
        tx.commit().await?;

        info!(application_id = %id, reviewer_id = %reviewer.user_id, "Application rejected");
        metrics::counter!("volunteer_applications_rejected_total").increment(1);
        self.event_bus.publish_application_event(ApplicationEvent::ApplicationRejected {
            application_id: id,
            activity_id: application.activity_id,
            reviewer_id: reviewer.user_id,
            reason: application.notes.clone().unwrap_or_default(),
            rejected_at: now,
        });
        Ok(application)
    }

    async fn cancel(
        &self,
        actor: &Actor,
        id: ApplicationId,
    ) -> Result<Application, CoordinatorError> {
        actor.require_student()?;
        let now = self.clock.now();
        let mut tx = self.database.begin().await?;

        let (mut application, activity) = Self::lock_with_activity(tx.as_mut(), id).await?;
        if application.student_id != actor.user_id {
            return Err(CoordinatorError::PermissionDenied(
                "only the applicant may cancel this application".to_string(),
            ));
        }

        let previous = application.cancel()?;
        tx.update_application(&application).await?;

        let mut seat_released = false;
        let mut change = None;
        if previous == ApplicationStatus::Approved {
            if let Some(mut activity) = activity {
                let activity_id = activity.id;
                activity.current_participants =
                    self.ledger.release(tx.as_mut(), activity_id).await?;
                change = self.status_engine.apply(tx.as_mut(), &mut activity, now).await?;
                seat_released = true;
            } else {
                warn!(
                    application_id = %id,
                    "Approved application has no live activity; no seat to release"
                );
            }
        }
        tx.commit().await?;

        info!(
            application_id = %id,
            student_id = %actor.user_id,
            from = %previous,
            seat_released,
            "Application cancelled"
        );
        metrics::counter!("volunteer_applications_cancelled_total").increment(1);
        self.publish_status_change(change, now);
        self.event_bus.publish_application_event(ApplicationEvent::ApplicationCancelled {
            application_id: id,
            activity_id: application.activity_id,
            seat_released,
            cancelled_at: now,
        });
        Ok(application)
    }

    async fn get(
        &self,
        actor: &Actor,
        id: ApplicationId,
    ) -> Result<ApplicationView, CoordinatorError> {
        let mut tx = self.database.begin().await?;
        let application = tx
            .find_application(id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("application", id))?;
        let live = match application.activity_id {
            Some(activity_id) => tx.find_activity(activity_id).await?,
            None => None,
        };

        let visible = match actor.role {
            Role::Admin => true,
            Role::Student => application.student_id == actor.user_id,
            Role::Organizer => live.as_ref().is_some_and(|a| actor.manages(&a.organization)),
            Role::Anonymous => false,
        };
        if !visible {
            return Err(CoordinatorError::PermissionDenied(
                "you may not view this application".to_string(),
            ));
        }

        Ok(ApplicationView::new(application, live.as_ref()))
    }

    async fn list(
        &self,
        actor: &Actor,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationView>, CoordinatorError> {
        let filter = match actor.role {
            Role::Admin => ApplicationFilter {
                status,
                ..Default::default()
            },
            Role::Student => ApplicationFilter {
                student_id: Some(actor.user_id),
                status,
                ..Default::default()
            },
            Role::Organizer => ApplicationFilter {
                organization: Some(actor.organizer_organization()?.to_string()),
                status,
                ..Default::default()
            },
            Role::Anonymous => {
                return Err(CoordinatorError::PermissionDenied(
                    "sign in to view applications".to_string(),
                ))
            }
        };

        let mut tx = self.database.begin().await?;
        let applications = tx.list_applications(&filter).await?;
        Self::views(tx.as_mut(), applications).await
    }

    async fn list_for_activity(
        &self,
        actor: &Actor,
        activity_id: ActivityId,
    ) -> Result<Vec<ApplicationView>, CoordinatorError> {
        let mut tx = self.database.begin().await?;
        let activity = tx
            .find_activity(activity_id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("activity", activity_id))?;
        actor.require_manager_of(&activity.organization)?;

        let filter = ApplicationFilter {
            activity_id: Some(activity_id),
            ..Default::default()
        };
        let applications = tx.list_applications(&filter).await?;
        Ok(applications
            .into_iter()
            .map(|application| ApplicationView::new(application, Some(&activity)))
            .collect())
    }

    async fn approved_activities(
        &self,
        student: &Actor,
    ) -> Result<Vec<Activity>, CoordinatorError> {
        student.require_student()?;
        let filter = ApplicationFilter {
            student_id: Some(student.user_id),
            status: Some(ApplicationStatus::Approved),
            ..Default::default()
        };

        let mut tx = self.database.begin().await?;
        let applications = tx.list_applications(&filter).await?;
        let live = Self::live_activities(tx.as_mut(), &applications).await?;

        let mut activities: Vec<Activity> = live.into_values().collect();
        activities.sort_by(|a, b| a.start_at.cmp(&b.start_at));
        Ok(activities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::actor::UserId;
    use crate::domain::clock::FixedClock;
    use crate::infrastructure::repositories::InMemoryDatabase;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()
    }

    struct Fixture {
        service: StandardApplicationService,
        database: Arc<InMemoryDatabase>,
        organizer: Actor,
    }

    async fn fixture(max_participants: Option<u32>, status: ActivityStatus) -> (Fixture, Activity) {
        let database = Arc::new(InMemoryDatabase::new());
        let clock = Arc::new(FixedClock::new(now()));
        let event_bus = Arc::new(EventBus::new(64));
        let engine = Arc::new(StatusEngine::new(
            database.clone(),
            clock.clone(),
            Duration::days(7),
            event_bus.clone(),
        ));
        let service =
            StandardApplicationService::new(database.clone(), clock, engine, event_bus);

        let organizer = Actor::organizer(UserId::new(), "Faculty of Science");
        let activity = Activity {
            id: ActivityId::new(),
            organizer_id: organizer.user_id,
            organization: "Faculty of Science".to_string(),
            title: "River cleanup".to_string(),
            description: String::new(),
            location: "Riverside".to_string(),
            categories: vec!["Community".to_string()],
            start_at: now() + Duration::days(14),
            end_at: now() + Duration::days(14) + Duration::hours(4),
            max_participants,
            current_participants: 0,
            status,
            hours_awarded: Some(4.0),
            rejection_reason: None,
            created_at: now(),
            updated_at: now(),
        };
        let mut tx = database.begin().await.unwrap();
        tx.insert_activity(&activity).await.unwrap();
        tx.commit().await.unwrap();

        (
            Fixture {
                service,
                database,
                organizer,
            },
            activity,
        )
    }

    #[tokio::test]
    async fn test_submit_requires_open_activity() {
        let (fx, activity) = fixture(None, ActivityStatus::Pending).await;
        let student = Actor::student(UserId::new());
        assert!(matches!(
            fx.service.submit(&student, activity.id).await,
            Err(CoordinatorError::NotOpen(ActivityStatus::Pending))
        ));
    }

    #[tokio::test]
    async fn test_only_students_apply() {
        let (fx, activity) = fixture(None, ActivityStatus::Open).await;
        assert!(matches!(
            fx.service.submit(&fx.organizer, activity.id).await,
            Err(CoordinatorError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_reject_requires_reason_and_pending() {
        let (fx, activity) = fixture(None, ActivityStatus::Open).await;
        let student = Actor::student(UserId::new());
        let application = fx.service.submit(&student, activity.id).await.unwrap();

        assert!(matches!(
            fx.service.reject(&fx.organizer, application.id, "   ").await,
            Err(CoordinatorError::Validation(_))
        ));
        let too_long = "x".repeat(226);
        assert!(fx.service.reject(&fx.organizer, application.id, &too_long).await.is_err());

        let rejected = fx
            .service
            .reject(&fx.organizer, application.id, " Schedule conflict ")
            .await
            .unwrap();
        assert_eq!(rejected.status, ApplicationStatus::Rejected);
        assert_eq!(rejected.notes.as_deref(), Some("Schedule conflict"));

        assert!(matches!(
            fx.service.approve(&fx.organizer, application.id).await,
            Err(CoordinatorError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_other_organization_cannot_approve() {
        let (fx, activity) = fixture(None, ActivityStatus::Open).await;
        let student = Actor::student(UserId::new());
        let application = fx.service.submit(&student, activity.id).await.unwrap();

        let outsider = Actor::organizer(UserId::new(), "Faculty of Arts");
        assert!(matches!(
            fx.service.approve(&outsider, application.id).await,
            Err(CoordinatorError::PermissionDenied(_))
        ));

        let mut tx = fx.database.begin().await.unwrap();
        let stored = tx.find_activity(activity.id).await.unwrap().unwrap();
        assert_eq!(stored.current_participants, 0);
    }

    #[tokio::test]
    async fn test_failed_reservation_leaves_application_pending() {
        let (fx, activity) = fixture(Some(1), ActivityStatus::Open).await;
        let first = Actor::student(UserId::new());
        let second = Actor::student(UserId::new());
        let a = fx.service.submit(&first, activity.id).await.unwrap();
        let b = fx.service.submit(&second, activity.id).await.unwrap();

        fx.service.approve(&fx.organizer, a.id).await.unwrap();
        assert!(matches!(
            fx.service.approve(&fx.organizer, b.id).await,
            Err(CoordinatorError::CapacityExceeded(_))
        ));

        let view = fx.service.get(&second, b.id).await.unwrap();
        assert_eq!(view.application.status, ApplicationStatus::Pending);
        assert_eq!(view.activity_status, Some(ActivityStatus::Full));
    }

    #[tokio::test]
    async fn test_cancel_only_by_owner() {
        let (fx, activity) = fixture(None, ActivityStatus::Open).await;
        let owner = Actor::student(UserId::new());
        let other = Actor::student(UserId::new());
        let application = fx.service.submit(&owner, activity.id).await.unwrap();

        assert!(matches!(
            fx.service.cancel(&other, application.id).await,
            Err(CoordinatorError::PermissionDenied(_))
        ));
        let cancelled = fx.service.cancel(&owner, application.id).await.unwrap();
        assert_eq!(cancelled.status, ApplicationStatus::Cancelled);
        assert!(matches!(
            fx.service.cancel(&owner, application.id).await,
            Err(CoordinatorError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_listing_is_scoped_by_role() {
        let (fx, activity) = fixture(None, ActivityStatus::Open).await;
        let alice = Actor::student(UserId::new());
        let bob = Actor::student(UserId::new());
        fx.service.submit(&alice, activity.id).await.unwrap();
        fx.service.submit(&bob, activity.id).await.unwrap();

        assert_eq!(fx.service.list(&alice, None).await.unwrap().len(), 1);
        assert_eq!(fx.service.list(&fx.organizer, None).await.unwrap().len(), 2);
        assert_eq!(
            fx.service
                .list(&Actor::organizer(UserId::new(), "Faculty of Arts"), None)
                .await
                .unwrap()
                .len(),
            0
        );
        assert_eq!(fx.service.list(&Actor::admin(UserId::new()), None).await.unwrap().len(), 2);
        assert!(fx.service.list(&Actor::anonymous(), None).await.is_err());

        let for_activity = fx.service.list_for_activity(&fx.organizer, activity.id).await.unwrap();
        assert_eq!(for_activity.len(), 2);
        assert!(for_activity.iter().all(|v| v.activity.title == "River cleanup"));
    }
}
