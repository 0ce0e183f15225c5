// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the unit-of-work and repository
//! abstractions defined in the domain layer.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve domain aggregates
//! - **Pattern:** Repository + Unit of Work (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! ## PostgreSQL
//!
//! [`PostgresUnitOfWork`] wraps one `sqlx` transaction; the query code for
//! each aggregate lives in `postgres_activity`, `postgres_application`,
//! `postgres_attendance` and `postgres_deletion_request`.
//!
//! ## In-Memory
//!
//! [`InMemoryDatabase`] keeps the whole store behind one async mutex. A unit
//! of work holds the lock for its lifetime and mutates a working copy that
//! replaces the store on commit, so transactions are fully serialized and a
//! dropped unit of work leaves no trace.

pub mod postgres;
pub mod postgres_activity;
pub mod postgres_application;
pub mod postgres_attendance;
pub mod postgres_deletion_request;

pub use postgres::PostgresUnitOfWork;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::activity::{derive_status, Activity, ActivityId, ActivityStatus};
use crate::domain::actor::UserId;
use crate::domain::application::{Application, ApplicationId, ApplicationStatus};
use crate::domain::check_in::{DailyCheckInCode, StudentCheckIn};
use crate::domain::deletion_request::{
    ActivityDeletionRequest, DeletionRequestId, DeletionRequestStatus,
};
use crate::domain::repository::{
    ActivityFilter, ActivityRepository, ApplicationFilter, ApplicationRepository,
    AttendanceRepository, Database, DeletionRequestRepository, RepositoryError, SeatReservation,
    StatusChange, UnitOfWork,
};

#[derive(Debug, Clone, Default)]
struct InMemoryState {
    activities: HashMap<ActivityId, Activity>,
    applications: HashMap<ApplicationId, Application>,
    check_in_codes: HashMap<(ActivityId, NaiveDate), DailyCheckInCode>,
    check_ins: HashMap<(ActivityId, UserId), StudentCheckIn>,
    deletion_requests: HashMap<DeletionRequestId, ActivityDeletionRequest>,
}

#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Database for InMemoryDatabase {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepositoryError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryUnitOfWork { guard, working }))
    }
}

pub struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<InMemoryState>,
    working: InMemoryState,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let InMemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

impl InMemoryUnitOfWork {
    fn activity_mut(&mut self, id: ActivityId) -> Result<&mut Activity, RepositoryError> {
        self.working
            .activities
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("activity {}", id)))
    }
}

#[async_trait]
impl ActivityRepository for InMemoryUnitOfWork {
    async fn insert_activity(&mut self, activity: &Activity) -> Result<(), RepositoryError> {
        if self.working.activities.contains_key(&activity.id) {
            return Err(RepositoryError::UniqueViolation("activities_pkey".to_string()));
        }
        self.working.activities.insert(activity.id, activity.clone());
        Ok(())
    }

    async fn update_activity(&mut self, activity: &Activity) -> Result<(), RepositoryError> {
        let stored = self.activity_mut(activity.id)?;
        let reserved = stored.current_participants;
        *stored = activity.clone();
        stored.current_participants = reserved;
        Ok(())
    }

    async fn update_activity_status(
        &mut self,
        id: ActivityId,
        status: ActivityStatus,
    ) -> Result<(), RepositoryError> {
        self.activity_mut(id)?.status = status;
        Ok(())
    }

    async fn find_activity(&mut self, id: ActivityId) -> Result<Option<Activity>, RepositoryError> {
        Ok(self.working.activities.get(&id).cloned())
    }

    async fn lock_activity(&mut self, id: ActivityId) -> Result<Option<Activity>, RepositoryError> {
        // The unit of work already holds the store exclusively
        self.find_activity(id).await
    }

    async fn list_activities(
        &mut self,
        filter: &ActivityFilter,
    ) -> Result<Vec<Activity>, RepositoryError> {
        let mut activities: Vec<Activity> = self
            .working
            .activities
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        activities.sort_by(|a, b| {
            a.start_at
                .cmp(&b.start_at)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(activities)
    }

    async fn delete_activity(&mut self, id: ActivityId) -> Result<bool, RepositoryError> {
        if self.working.activities.remove(&id).is_none() {
            return Ok(false);
        }

        for application in self.working.applications.values_mut() {
            if application.activity_id == Some(id) {
                application.activity_id = None;
            }
        }
        for request in self.working.deletion_requests.values_mut() {
            if request.activity_id == Some(id) {
                request.activity_id = None;
            }
        }
        self.working.check_in_codes.retain(|(activity_id, _), _| *activity_id != id);
        self.working.check_ins.retain(|(activity_id, _), _| *activity_id != id);
        Ok(true)
    }

    async fn try_reserve_seat(
        &mut self,
        id: ActivityId,
    ) -> Result<SeatReservation, RepositoryError> {
        let activity = self.activity_mut(id)?;
        if activity.capacity_reached() {
            return Ok(SeatReservation::Full);
        }
        activity.current_participants += 1;
        Ok(SeatReservation::Reserved(activity.current_participants))
    }

    async fn release_seat(&mut self, id: ActivityId) -> Result<u32, RepositoryError> {
        let activity = self.activity_mut(id)?;
        activity.current_participants = activity.current_participants.saturating_sub(1);
        Ok(activity.current_participants)
    }

    async fn refresh_statuses(
        &mut self,
        now: DateTime<Utc>,
        upcoming_window: Duration,
    ) -> Result<Vec<StatusChange>, RepositoryError> {
        let mut changes = Vec::new();
        for activity in self.working.activities.values_mut() {
            let next = derive_status(activity, now, upcoming_window);
            if next != activity.status {
                changes.push(StatusChange {
                    activity_id: activity.id,
                    from: activity.status,
                    to: next,
                });
                activity.status = next;
            }
        }
        changes.sort_by_key(|c| c.activity_id);
        Ok(changes)
    }
}

#[async_trait]
impl ApplicationRepository for InMemoryUnitOfWork {
    async fn insert_application(
        &mut self,
        application: &Application,
    ) -> Result<(), RepositoryError> {
        let duplicate = application.blocks_reapplication()
            && application.activity_id.is_some()
            && self.working.applications.values().any(|existing| {
                existing.activity_id == application.activity_id
                    && existing.student_id == application.student_id
                    && existing.blocks_reapplication()
            });
        if duplicate {
            return Err(RepositoryError::UniqueViolation("uq_applications_active".to_string()));
        }
        if self.working.applications.contains_key(&application.id) {
            return Err(RepositoryError::UniqueViolation("applications_pkey".to_string()));
        }
        self.working.applications.insert(application.id, application.clone());
        Ok(())
    }

    async fn update_application(
        &mut self,
        application: &Application,
    ) -> Result<(), RepositoryError> {
        let stored = self
            .working
            .applications
            .get_mut(&application.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("application {}", application.id)))?;
        stored.status = application.status;
        stored.decision_at = application.decision_at;
        stored.decision_by = application.decision_by;
        stored.notes = application.notes.clone();
        Ok(())
    }

    async fn find_application(
        &mut self,
        id: ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        Ok(self.working.applications.get(&id).cloned())
    }

    async fn lock_application(
        &mut self,
        id: ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        self.find_application(id).await
    }

    async fn find_active_application(
        &mut self,
        activity_id: ActivityId,
        student_id: UserId,
    ) -> Result<Option<Application>, RepositoryError> {
        Ok(self
            .working
            .applications
            .values()
            .find(|a| {
                a.activity_id == Some(activity_id)
                    && a.student_id == student_id
                    && a.blocks_reapplication()
            })
            .cloned())
    }

    async fn list_applications(
        &mut self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, RepositoryError> {
        let activities = &self.working.activities;
        let mut applications: Vec<Application> = self
            .working
            .applications
            .values()
            .filter(|a| filter.activity_id.map_or(true, |id| a.activity_id == Some(id)))
            .filter(|a| filter.student_id.map_or(true, |id| a.student_id == id))
            .filter(|a| filter.status.map_or(true, |status| a.status == status))
            .filter(|a| match &filter.organization {
                None => true,
                Some(org) => a
                    .activity_id
                    .and_then(|id| activities.get(&id))
                    .is_some_and(|activity| &activity.organization == org),
            })
            .cloned()
            .collect();
        applications.sort_by(|a, b| b.applied_at.cmp(&a.applied_at));
        Ok(applications)
    }

    async fn approved_student_ids(
        &mut self,
        activity_id: ActivityId,
    ) -> Result<Vec<UserId>, RepositoryError> {
        let mut approved: Vec<&Application> = self
            .working
            .applications
            .values()
            .filter(|a| {
                a.activity_id == Some(activity_id) && a.status == ApplicationStatus::Approved
            })
            .collect();
        approved.sort_by_key(|a| a.applied_at);
        Ok(approved.into_iter().map(|a| a.student_id).collect())
    }
}

#[async_trait]
impl AttendanceRepository for InMemoryUnitOfWork {
    async fn find_check_in_code(
        &mut self,
        activity_id: ActivityId,
        valid_date: NaiveDate,
    ) -> Result<Option<DailyCheckInCode>, RepositoryError> {
        Ok(self.working.check_in_codes.get(&(activity_id, valid_date)).cloned())
    }

    async fn insert_check_in_code_if_absent(
        &mut self,
        code: &DailyCheckInCode,
    ) -> Result<DailyCheckInCode, RepositoryError> {
        if !self.working.activities.contains_key(&code.activity_id) {
            return Err(RepositoryError::NotFound(format!("activity {}", code.activity_id)));
        }
        let stored = self
            .working
            .check_in_codes
            .entry((code.activity_id, code.valid_date))
            .or_insert_with(|| code.clone());
        Ok(stored.clone())
    }

    async fn find_student_check_in(
        &mut self,
        activity_id: ActivityId,
        student_id: UserId,
    ) -> Result<Option<StudentCheckIn>, RepositoryError> {
        Ok(self.working.check_ins.get(&(activity_id, student_id)).cloned())
    }

    async fn upsert_student_check_in(
        &mut self,
        check_in: &StudentCheckIn,
    ) -> Result<StudentCheckIn, RepositoryError> {
        let key = (check_in.activity_id, check_in.student_id);
        let stored = self
            .working
            .check_ins
            .entry(key)
            .and_modify(|existing| {
                existing.attendance_status = check_in.attendance_status;
                existing.checked_in_at = check_in.checked_in_at;
                existing.marked_absent_at = check_in.marked_absent_at;
            })
            .or_insert_with(|| check_in.clone());
        Ok(stored.clone())
    }

    async fn list_student_check_ins(
        &mut self,
        activity_id: ActivityId,
    ) -> Result<Vec<StudentCheckIn>, RepositoryError> {
        let mut check_ins: Vec<StudentCheckIn> = self
            .working
            .check_ins
            .values()
            .filter(|c| c.activity_id == activity_id)
            .cloned()
            .collect();
        check_ins.sort_by_key(|c| c.checked_in_at.or(c.marked_absent_at));
        Ok(check_ins)
    }

    async fn insert_absences(
        &mut self,
        activity_id: ActivityId,
        student_ids: &[UserId],
        marked_at: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        let mut created = 0;
        for student_id in student_ids {
            let key = (activity_id, *student_id);
            if !self.working.check_ins.contains_key(&key) {
                self.working
                    .check_ins
                    .insert(key, StudentCheckIn::absent(activity_id, *student_id, marked_at));
                created += 1;
            }
        }
        Ok(created)
    }
}

#[async_trait]
impl DeletionRequestRepository for InMemoryUnitOfWork {
    async fn insert_deletion_request(
        &mut self,
        request: &ActivityDeletionRequest,
    ) -> Result<(), RepositoryError> {
        self.working.deletion_requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn update_deletion_request(
        &mut self,
        request: &ActivityDeletionRequest,
    ) -> Result<(), RepositoryError> {
        let stored = self
            .working
            .deletion_requests
            .get_mut(&request.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("deletion request {}", request.id)))?;
        *stored = request.clone();
        Ok(())
    }

    async fn find_deletion_request(
        &mut self,
        id: DeletionRequestId,
    ) -> Result<Option<ActivityDeletionRequest>, RepositoryError> {
        Ok(self.working.deletion_requests.get(&id).cloned())
    }

    async fn lock_deletion_request(
        &mut self,
        id: DeletionRequestId,
    ) -> Result<Option<ActivityDeletionRequest>, RepositoryError> {
        self.find_deletion_request(id).await
    }

    async fn list_deletion_requests(
        &mut self,
        status: Option<DeletionRequestStatus>,
    ) -> Result<Vec<ActivityDeletionRequest>, RepositoryError> {
        let mut requests: Vec<ActivityDeletionRequest> = self
            .working
            .deletion_requests
            .values()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }
}
