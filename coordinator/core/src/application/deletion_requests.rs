// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Deletion Request Workflow - Application Layer
//!
//! Organizers file a request to delete an activity that already has
//! reserved seats; admins review it. Approval deletes the activity in the
//! same unit of work. Requests outlive the activity through their snapshot.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::activity::{ActivityId, ActivitySnapshot};
use crate::domain::actor::Actor;
use crate::domain::clock::Clock;
use crate::domain::deletion_request::{
    ActivityDeletionRequest, DeletionRequestId, DeletionRequestStatus, ReviewAction,
};
use crate::domain::error::CoordinatorError;
use crate::domain::events::{ActivityEvent, DeletionRequestEvent};
use crate::domain::repository::{ActivityFilter, Database};
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, Clone, Serialize)]
pub struct DeletionRequestView {
    #[serde(flatten)]
    pub request: ActivityDeletionRequest,
    pub activity: ActivitySnapshot,
}

#[async_trait]
pub trait DeletionRequestService: Send + Sync {
    async fn request(
        &self,
        organizer: &Actor,
        activity_id: ActivityId,
        reason: &str,
    ) -> Result<ActivityDeletionRequest, CoordinatorError>;

    /// Approve (deleting the activity) or reject a pending request. A note
    /// is required when rejecting.
    async fn review(
        &self,
        admin: &Actor,
        request_id: DeletionRequestId,
        action: ReviewAction,
        note: Option<&str>,
    ) -> Result<ActivityDeletionRequest, CoordinatorError>;

    async fn list(
        &self,
        admin: &Actor,
        status: Option<DeletionRequestStatus>,
    ) -> Result<Vec<DeletionRequestView>, CoordinatorError>;
}

pub struct StandardDeletionRequestService {
    database: Arc<dyn Database>,
    clock: Arc<dyn Clock>,
    event_bus: Arc<EventBus>,
}

impl StandardDeletionRequestService {
    pub fn new(
        database: Arc<dyn Database>,
        clock: Arc<dyn Clock>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            database,
            clock,
            event_bus,
        }
    }
}

#[async_trait]
impl DeletionRequestService for StandardDeletionRequestService {
    async fn request(
        &self,
        organizer: &Actor,
        activity_id: ActivityId,
        reason: &str,
    ) -> Result<ActivityDeletionRequest, CoordinatorError> {
        let organization = organizer.organizer_organization()?;
        let now = self.clock.now();
        let mut tx = self.database.begin().await?;

        let activity = tx
            .lock_activity(activity_id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("activity", activity_id))?;
        if activity.organization != organization {
            return Err(CoordinatorError::PermissionDenied(
                "you do not manage activities of this organization".to_string(),
            ));
        }
        if !activity.has_reserved_seats() {
            return Err(CoordinatorError::DeletionNotRequired);
        }

        let request = ActivityDeletionRequest::new(&activity, organizer.user_id, reason, now)?;
        tx.insert_deletion_request(&request).await?;
        tx.commit().await?;

        info!(
            request_id = %request.id,
            activity_id = %activity_id,
            requested_by = %organizer.user_id,
            "Activity deletion requested"
        );
        metrics::counter!("volunteer_deletion_requests_total").increment(1);
        self.event_bus
            .publish_deletion_request_event(DeletionRequestEvent::DeletionRequested {
                request_id: request.id,
                activity_id,
                requested_by: organizer.user_id,
                requested_at: now,
            });
        Ok(request)
    }

    async fn review(
        &self,
        admin: &Actor,
        request_id: DeletionRequestId,
        action: ReviewAction,
        note: Option<&str>,
    ) -> Result<ActivityDeletionRequest, CoordinatorError> {
        admin.require_admin()?;
        let now = self.clock.now();
        let mut tx = self.database.begin().await?;

        // Activity row first: deleting it rewrites every request that
        // references it
        let unlocked = tx
            .find_deletion_request(request_id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("deletion request", request_id))?;
        if let Some(activity_id) = unlocked.activity_id {
            tx.lock_activity(activity_id).await?;
        }
        let mut request = tx
            .lock_deletion_request(request_id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("deletion request", request_id))?;

        match action {
            ReviewAction::Approve => {
                request.approve(admin.user_id, note, now)?;
                let target = request.activity_id.take();
                tx.update_deletion_request(&request).await?;

                let deleted = match target {
                    Some(activity_id) => tx.delete_activity(activity_id).await?,
                    None => false,
                };
                tx.commit().await?;

                if !deleted {
                    debug!(request_id = %request_id, "Activity already deleted; request satisfied");
                }
                info!(
                    request_id = %request_id,
                    reviewer_id = %admin.user_id,
                    "Deletion request approved"
                );
                metrics::counter!("volunteer_deletion_requests_approved_total").increment(1);
                self.event_bus
                    .publish_deletion_request_event(DeletionRequestEvent::DeletionRequestApproved {
                        request_id,
                        activity_id: target,
                        reviewer_id: admin.user_id,
                        reviewed_at: now,
                    });
                if let (true, Some(activity_id)) = (deleted, target) {
                    self.event_bus.publish_activity_event(ActivityEvent::ActivityDeleted {
                        activity_id,
                        deleted_by: admin.user_id,
                        deleted_at: now,
                    });
                }
            }
            ReviewAction::Reject => {
                request.reject(admin.user_id, note.unwrap_or_default(), now)?;
                tx.update_deletion_request(&request).await?;
                tx.commit().await?;

                info!(
                    request_id = %request_id,
                    reviewer_id = %admin.user_id,
                    "Deletion request rejected"
                );
                metrics::counter!("volunteer_deletion_requests_rejected_total").increment(1);
                self.event_bus
                    .publish_deletion_request_event(DeletionRequestEvent::DeletionRequestRejected {
                        request_id,
                        reviewer_id: admin.user_id,
                        reviewed_at: now,
                    });
            }
        }
        Ok(request)
    }

    async fn list(
        &self,
        admin: &Actor,
        status: Option<DeletionRequestStatus>,
    ) -> Result<Vec<DeletionRequestView>, CoordinatorError> {
        admin.require_admin()?;
        let mut tx = self.database.begin().await?;
        let requests = tx.list_deletion_requests(status).await?;

        let ids: Vec<ActivityId> = requests.iter().filter_map(|r| r.activity_id).collect();
        let live = if ids.is_empty() {
            HashMap::new()
        } else {
            let filter = ActivityFilter {
                ids: Some(ids),
                ..Default::default()
            };
            tx.list_activities(&filter)
                .await?
                .into_iter()
                .map(|a| (a.id, a))
                .collect()
        };

        Ok(requests
            .into_iter()
            .map(|request| {
                let activity = request
                    .snapshot
                    .resolve(request.activity_id.and_then(|id| live.get(&id)));
                DeletionRequestView { request, activity }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::activity::{Activity, ActivityStatus};
    use crate::domain::actor::UserId;
    use crate::domain::clock::FixedClock;
    use crate::infrastructure::repositories::InMemoryDatabase;
    use chrono::{Duration, TimeZone, Utc};

    async fn setup(
        reserved: u32,
    ) -> (StandardDeletionRequestService, Arc<InMemoryDatabase>, Actor, Activity) {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap();
        let database = Arc::new(InMemoryDatabase::new());
        let service = StandardDeletionRequestService::new(
            database.clone(),
            Arc::new(FixedClock::new(now)),
            Arc::new(EventBus::new(16)),
        );
        let organizer = Actor::organizer(UserId::new(), "Faculty of Science");
        let activity = Activity {
            id: ActivityId::new(),
            organizer_id: organizer.user_id,
            organization: "Faculty of Science".to_string(),
            title: "Beach cleanup".to_string(),
            description: String::new(),
            location: "Bay".to_string(),
            categories: vec!["Environment".to_string()],
            start_at: now + Duration::days(10),
            end_at: now + Duration::days(10) + Duration::hours(5),
            max_participants: Some(20),
            current_participants: reserved,
            status: ActivityStatus::Open,
            hours_awarded: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };
        let mut tx = database.begin().await.unwrap();
        tx.insert_activity(&activity).await.unwrap();
        tx.commit().await.unwrap();
        (service, database, organizer, activity)
    }

    #[tokio::test]
    async fn test_request_not_required_without_seats() {
        let (service, _, organizer, activity) = setup(0).await;
        assert!(matches!(
            service.request(&organizer, activity.id, "Venue closed").await,
            Err(CoordinatorError::DeletionNotRequired)
        ));
    }

    #[tokio::test]
    async fn test_request_requires_reason_and_same_organization() {
        let (service, _, organizer, activity) = setup(3).await;
        assert!(matches!(
            service.request(&organizer, activity.id, "  ").await,
            Err(CoordinatorError::Validation(_))
        ));
        let outsider = Actor::organizer(UserId::new(), "Faculty of Arts");
        assert!(matches!(
            service.request(&outsider, activity.id, "Venue closed").await,
            Err(CoordinatorError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_approve_deletes_activity_and_keeps_snapshot() {
        let (service, database, organizer, activity) = setup(3).await;
        let admin = Actor::admin(UserId::new());
        let first = service.request(&organizer, activity.id, "Venue closed").await.unwrap();
        let second = service.request(&organizer, activity.id, "Storm warning").await.unwrap();

        assert!(service
            .review(&organizer, first.id, ReviewAction::Approve, None)
            .await
            .is_err());

        let approved = service
            .review(&admin, first.id, ReviewAction::Approve, Some("ok"))
            .await
            .unwrap();
        assert_eq!(approved.status, DeletionRequestStatus::Approved);
        assert!(approved.activity_id.is_none());

        let mut tx = database.begin().await.unwrap();
        assert!(tx.find_activity(activity.id).await.unwrap().is_none());
        drop(tx);

        // The activity is already gone; approving the other request is satisfied
        let also = service
            .review(&admin, second.id, ReviewAction::Approve, None)
            .await
            .unwrap();
        assert_eq!(also.status, DeletionRequestStatus::Approved);

        let views = service.list(&admin, Some(DeletionRequestStatus::Approved)).await.unwrap();
        assert_eq!(views.len(), 2);
        assert!(views.iter().all(|v| v.activity.title == "Beach cleanup"));
    }

    #[tokio::test]
    async fn test_reject_requires_note_and_pending() {
        let (service, _, organizer, activity) = setup(1).await;
        let admin = Actor::admin(UserId::new());
        let request = service.request(&organizer, activity.id, "Venue closed").await.unwrap();

        assert!(matches!(
            service.review(&admin, request.id, ReviewAction::Reject, None).await,
            Err(CoordinatorError::Validation(_))
        ));
        let rejected = service
            .review(&admin, request.id, ReviewAction::Reject, Some("Find a new venue"))
            .await
            .unwrap();
        assert_eq!(rejected.review_note.as_deref(), Some("Find a new venue"));
        assert!(rejected.activity_id.is_some());

        assert!(matches!(
            service.review(&admin, request.id, ReviewAction::Approve, None).await,
            Err(CoordinatorError::InvalidState { .. })
        ));
    }
}
