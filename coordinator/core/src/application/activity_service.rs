// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Activity Service - Application Layer
//!
//! Activity lifecycle around the automatic statuses: organizers post
//! activities that wait in `Pending` until an admin moderates them, edit
//! and cancel them, and delete them directly while no seat is reserved.
//! Listing and single reads are scoped by the caller's role.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Collaborators:** `Database`, `StatusEngine`, `CategoryTaxonomy`, `EventBus`

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::application::status_engine::StatusEngine;
use crate::domain::activity::{
    Activity, ActivityDraft, ActivityId, ActivityPatch, ActivityStatus, ModerationDecision,
};
use crate::domain::actor::{Actor, Role};
use crate::domain::clock::Clock;
use crate::domain::error::CoordinatorError;
use crate::domain::events::ActivityEvent;
use crate::domain::repository::{ActivityFilter, Database, StatusChange, UnitOfWork};
use crate::domain::taxonomy::{CategoryTaxonomy, TaxonomyMetadata};
use crate::infrastructure::event_bus::EventBus;

#[async_trait]
pub trait ActivityService: Send + Sync {
    /// Post a new activity; it awaits moderation in `Pending`
    async fn create(
        &self,
        actor: &Actor,
        draft: ActivityDraft,
    ) -> Result<Activity, CoordinatorError>;

    /// Read one activity with its status recomputed
    async fn get(&self, actor: &Actor, id: ActivityId) -> Result<Activity, CoordinatorError>;

    async fn list(
        &self,
        actor: &Actor,
        status: Option<ActivityStatus>,
    ) -> Result<Vec<Activity>, CoordinatorError>;

    async fn update(
        &self,
        actor: &Actor,
        id: ActivityId,
        patch: ActivityPatch,
    ) -> Result<Activity, CoordinatorError>;

    /// Admins delete unconditionally; organizers only while no seat is
    /// reserved, otherwise a deletion request is needed
    async fn delete(&self, actor: &Actor, id: ActivityId) -> Result<(), CoordinatorError>;

    async fn cancel(&self, actor: &Actor, id: ActivityId) -> Result<Activity, CoordinatorError>;

    async fn moderate(
        &self,
        admin: &Actor,
        id: ActivityId,
        decision: ModerationDecision,
    ) -> Result<Activity, CoordinatorError>;

    async fn pending_moderation(&self, admin: &Actor) -> Result<Vec<Activity>, CoordinatorError>;

    fn metadata(&self) -> TaxonomyMetadata;
}

pub struct StandardActivityService {
    database: Arc<dyn Database>,
    clock: Arc<dyn Clock>,
    taxonomy: Arc<CategoryTaxonomy>,
    status_engine: Arc<StatusEngine>,
    event_bus: Arc<EventBus>,
}

impl StandardActivityService {
    pub fn new(
        database: Arc<dyn Database>,
        clock: Arc<dyn Clock>,
        taxonomy: Arc<CategoryTaxonomy>,
        status_engine: Arc<StatusEngine>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            database,
            clock,
            taxonomy,
            status_engine,
            event_bus,
        }
    }

    async fn lock_activity(
        tx: &mut dyn UnitOfWork,
        id: ActivityId,
    ) -> Result<Activity, CoordinatorError> {
        tx.lock_activity(id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("activity", id))
    }

    fn visible_to(actor: &Actor, activity: &Activity) -> bool {
        match actor.role {
            Role::Admin => true,
            Role::Organizer => actor.manages(&activity.organization),
            Role::Student => activity.status != ActivityStatus::Pending,
            Role::Anonymous => activity.status == ActivityStatus::Open,
        }
    }

    fn publish_change(&self, change: Option<StatusChange>, now: chrono::DateTime<chrono::Utc>) {
        if let Some(change) = change {
            self.status_engine.publish_changes(&[change], now);
        }
    }
}

#[async_trait]
impl ActivityService for StandardActivityService {
    async fn create(
        &self,
        actor: &Actor,
        draft: ActivityDraft,
    ) -> Result<Activity, CoordinatorError> {
        let organization = match actor.role {
            Role::Organizer => actor.organizer_organization()?.to_string(),
            Role::Admin => draft.organization.clone().ok_or_else(|| {
                CoordinatorError::validation(
                    "organization is required when an admin posts an activity",
                )
            })?,
            _ => {
                return Err(CoordinatorError::PermissionDenied(
                    "only organizers may post activities".to_string(),
                ))
            }
        };

        let now = self.clock.now();
        let activity = Activity::new(actor.user_id, organization, draft, &self.taxonomy, now)?;

        let mut tx = self.database.begin().await?;
        tx.insert_activity(&activity).await?;
        tx.commit().await?;

        info!(
            activity_id = %activity.id,
            organization = %activity.organization,
            organizer_id = %actor.user_id,
            "Activity created"
        );
        metrics::counter!("volunteer_activities_created_total").increment(1);
        self.event_bus.publish_activity_event(ActivityEvent::ActivityCreated {
            activity_id: activity.id,
            organizer_id: actor.user_id,
            created_at: now,
        });
        Ok(activity)
    }

    async fn get(&self, actor: &Actor, id: ActivityId) -> Result<Activity, CoordinatorError> {
        let now = self.clock.now();
        let mut tx = self.database.begin().await?;
        let mut activity = Self::lock_activity(tx.as_mut(), id).await?;
        let change = self.status_engine.apply(tx.as_mut(), &mut activity, now).await?;
        tx.commit().await?;
        self.publish_change(change, now);

        if !Self::visible_to(actor, &activity) {
            // Hidden activities are indistinguishable from missing ones
            return Err(CoordinatorError::not_found("activity", id));
        }
        Ok(activity)
    }

    async fn list(
        &self,
        actor: &Actor,
        status: Option<ActivityStatus>,
    ) -> Result<Vec<Activity>, CoordinatorError> {
        let requested = status.map(|s| vec![s]);
        let filter = match actor.role {
            Role::Admin => ActivityFilter {
                statuses: requested,
                ..Default::default()
            },
            Role::Organizer => ActivityFilter {
                statuses: requested,
                organization: Some(actor.organizer_organization()?.to_string()),
                ..Default::default()
            },
            Role::Student => ActivityFilter {
                statuses: requested,
                excluded_statuses: vec![ActivityStatus::Pending],
                ..Default::default()
            },
            Role::Anonymous => {
                if status.is_some_and(|s| s != ActivityStatus::Open) {
                    return Ok(Vec::new());
                }
                ActivityFilter {
                    statuses: Some(vec![ActivityStatus::Open]),
                    ..Default::default()
                }
            }
        };

        let mut tx = self.database.begin().await?;
        Ok(tx.list_activities(&filter).await?)
    }

    async fn update(
        &self,
        actor: &Actor,
        id: ActivityId,
        patch: ActivityPatch,
    ) -> Result<Activity, CoordinatorError> {
        let now = self.clock.now();
        let mut tx = self.database.begin().await?;
        let mut activity = Self::lock_activity(tx.as_mut(), id).await?;
        actor.require_manager_of(&activity.organization)?;

        activity.apply_patch(patch, &self.taxonomy, now)?;
        tx.update_activity(&activity).await?;
        let change = self.status_engine.apply(tx.as_mut(), &mut activity, now).await?;
        tx.commit().await?;

        info!(activity_id = %id, updated_by = %actor.user_id, "Activity updated");
        self.publish_change(change, now);
        self.event_bus.publish_activity_event(ActivityEvent::ActivityUpdated {
            activity_id: id,
            updated_by: actor.user_id,
            updated_at: now,
        });
        Ok(activity)
    }

    async fn delete(&self, actor: &Actor, id: ActivityId) -> Result<(), CoordinatorError> {
        let now = self.clock.now();
        let mut tx = self.database.begin().await?;
        let activity = Self::lock_activity(tx.as_mut(), id).await?;
        actor.require_manager_of(&activity.organization)?;

        if !actor.is_admin() && activity.has_reserved_seats() {
            return Err(CoordinatorError::DeletionRequiresApproval);
        }

        tx.delete_activity(id).await?;
        tx.commit().await?;

        info!(activity_id = %id, deleted_by = %actor.user_id, "Activity deleted");
        metrics::counter!("volunteer_activities_deleted_total").increment(1);
        self.event_bus.publish_activity_event(ActivityEvent::ActivityDeleted {
            activity_id: id,
            deleted_by: actor.user_id,
            deleted_at: now,
        });
        Ok(())
    }

    async fn cancel(&self, actor: &Actor, id: ActivityId) -> Result<Activity, CoordinatorError> {
        let now = self.clock.now();
        let mut tx = self.database.begin().await?;
        let mut activity = Self::lock_activity(tx.as_mut(), id).await?;
        actor.require_manager_of(&activity.organization)?;

        let from = activity.status;
        activity.cancel(now)?;
        tx.update_activity(&activity).await?;
        tx.commit().await?;

        info!(activity_id = %id, cancelled_by = %actor.user_id, from = %from, "Activity cancelled");
        self.publish_change(
            Some(StatusChange {
                activity_id: id,
                from,
                to: ActivityStatus::Cancelled,
            }),
            now,
        );
        Ok(activity)
    }

    async fn moderate(
        &self,
        admin: &Actor,
        id: ActivityId,
        decision: ModerationDecision,
    ) -> Result<Activity, CoordinatorError> {
        admin.require_admin()?;
        let now = self.clock.now();
        let mut tx = self.database.begin().await?;
        let mut activity = Self::lock_activity(tx.as_mut(), id).await?;

        activity.moderate(&decision, now)?;
        tx.update_activity(&activity).await?;
        // An approved activity may already sit inside the upcoming window
        let change = self.status_engine.apply(tx.as_mut(), &mut activity, now).await?;
        tx.commit().await?;

        info!(
            activity_id = %id,
            moderator_id = %admin.user_id,
            status = %activity.status,
            "Activity moderated"
        );
        self.publish_change(change, now);
        self.event_bus.publish_activity_event(ActivityEvent::ActivityModerated {
            activity_id: id,
            moderator_id: admin.user_id,
            status: activity.status,
            moderated_at: now,
        });
        Ok(activity)
    }

    async fn pending_moderation(&self, admin: &Actor) -> Result<Vec<Activity>, CoordinatorError> {
        admin.require_admin()?;
        let filter = ActivityFilter {
            statuses: Some(vec![ActivityStatus::Pending]),
            ..Default::default()
        };
        let mut tx = self.database.begin().await?;
        Ok(tx.list_activities(&filter).await?)
    }

    fn metadata(&self) -> TaxonomyMetadata {
        self.taxonomy.metadata()
    }
}
