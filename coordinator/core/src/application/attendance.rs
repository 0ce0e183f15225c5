// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Attendance Tracker - Application Layer
//!
//! Student self check-in against the activity's daily code, and absence
//! marking for approved students who never checked in. Absence marking runs
//! per activity on demand, or as a sweep over every activity that completed
//! within a lookback window.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Collaborators:** `Database`, `CheckInCodeManager`, `StatusEngine`, `EventBus`

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::check_in_codes::CheckInCodeManager;
use crate::application::status_engine::StatusEngine;
use crate::domain::activity::{Activity, ActivityId, ActivityStatus, TimeWindow};
use crate::domain::actor::{Actor, UserId};
use crate::domain::application::ApplicationStatus;
use crate::domain::check_in::{DailyCheckInCode, StudentCheckIn};
use crate::domain::clock::Clock;
use crate::domain::error::CoordinatorError;
use crate::domain::events::AttendanceEvent;
use crate::domain::repository::{ActivityFilter, Database, UnitOfWork};
use crate::infrastructure::event_bus::EventBus;

/// Absences recorded (or, in a dry run, that would be recorded) for one activity
#[derive(Debug, Clone, Serialize)]
pub struct ActivityAbsences {
    pub activity_id: ActivityId,
    pub title: String,
    pub end_at: DateTime<Utc>,
    pub absent: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AbsenceSweepReport {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub dry_run: bool,
    pub activities: Vec<ActivityAbsences>,
}

impl AbsenceSweepReport {
    pub fn total(&self) -> usize {
        self.activities.iter().map(|a| a.absent).sum()
    }
}

#[async_trait]
pub trait CheckInService: Send + Sync {
    /// Today's code for an activity, issuing one on first request
    async fn get_or_create_today_code(
        &self,
        actor: &Actor,
        activity_id: ActivityId,
    ) -> Result<DailyCheckInCode, CoordinatorError>;

    async fn check_in(
        &self,
        student: &Actor,
        activity_id: ActivityId,
        submitted_code: &str,
    ) -> Result<StudentCheckIn, CoordinatorError>;

    /// Record every approved student without a check-in as absent. Returns
    /// the number of records created; re-runs create none.
    async fn mark_absent(&self, activity_id: ActivityId) -> Result<usize, CoordinatorError>;

    /// `mark_absent` on behalf of the activity's organizer or an admin
    async fn mark_absent_as(
        &self,
        actor: &Actor,
        activity_id: ActivityId,
    ) -> Result<usize, CoordinatorError>;

    async fn list_check_ins(
        &self,
        actor: &Actor,
        activity_id: ActivityId,
    ) -> Result<Vec<StudentCheckIn>, CoordinatorError>;

    async fn my_status(
        &self,
        student: &Actor,
        activity_id: ActivityId,
    ) -> Result<Option<StudentCheckIn>, CoordinatorError>;

    /// Mark absences for every activity that completed in the last
    /// `lookback_days` days
    async fn sweep_absences(
        &self,
        lookback_days: u32,
        dry_run: bool,
    ) -> Result<AbsenceSweepReport, CoordinatorError>;
}

pub struct StandardCheckInService {
    database: Arc<dyn Database>,
    clock: Arc<dyn Clock>,
    codes: CheckInCodeManager,
    status_engine: Arc<StatusEngine>,
    event_bus: Arc<EventBus>,
}

impl StandardCheckInService {
    pub fn new(
        database: Arc<dyn Database>,
        clock: Arc<dyn Clock>,
        codes: CheckInCodeManager,
        status_engine: Arc<StatusEngine>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            database,
            clock,
            codes,
            status_engine,
            event_bus,
        }
    }

    async fn find_activity(
        tx: &mut dyn UnitOfWork,
        id: ActivityId,
    ) -> Result<Activity, CoordinatorError> {
        tx.find_activity(id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("activity", id))
    }

    /// Approved students that have no attendance record yet
    async fn absent_candidates(
        tx: &mut dyn UnitOfWork,
        activity_id: ActivityId,
    ) -> Result<Vec<UserId>, CoordinatorError> {
        let recorded: HashSet<UserId> = tx
            .list_student_check_ins(activity_id)
            .await?
            .into_iter()
            .map(|c| c.student_id)
            .collect();
        Ok(tx
            .approved_student_ids(activity_id)
            .await?
            .into_iter()
            .filter(|id| !recorded.contains(id))
            .collect())
    }

    async fn record_absences(
        &self,
        activity_id: ActivityId,
        dry_run: bool,
    ) -> Result<(Activity, usize), CoordinatorError> {
        let now = self.clock.now();
        let mut tx = self.database.begin().await?;
        let activity = Self::find_activity(tx.as_mut(), activity_id).await?;
        let candidates = Self::absent_candidates(tx.as_mut(), activity_id).await?;

        if dry_run || candidates.is_empty() {
            return Ok((activity, candidates.len()));
        }

        let created = tx.insert_absences(activity_id, &candidates, now).await?;
        tx.commit().await?;

        info!(activity_id = %activity_id, absent = created, "Marked students absent");
        metrics::counter!("volunteer_absences_marked_total").increment(created as u64);
        self.event_bus.publish_attendance_event(AttendanceEvent::StudentsMarkedAbsent {
            activity_id,
            count: created,
            marked_at: now,
        });
        Ok((activity, created))
    }
}

#[async_trait]
impl CheckInService for StandardCheckInService {
    async fn get_or_create_today_code(
        &self,
        actor: &Actor,
        activity_id: ActivityId,
    ) -> Result<DailyCheckInCode, CoordinatorError> {
        let mut tx = self.database.begin().await?;
        let activity = Self::find_activity(tx.as_mut(), activity_id).await?;
        actor.require_manager_of(&activity.organization)?;

        let (code, issued) = self.codes.get_or_create_today_code(tx.as_mut(), activity_id).await?;
        tx.commit().await?;

        if issued {
            info!(
                activity_id = %activity_id,
                valid_date = %code.valid_date,
                "Check-in code issued"
            );
            self.event_bus.publish_attendance_event(AttendanceEvent::CheckInCodeIssued {
                activity_id,
                valid_date: code.valid_date,
                issued_at: code.created_at,
            });
        }
        Ok(code)
    }

    async fn check_in(
        &self,
        student: &Actor,
        activity_id: ActivityId,
        submitted_code: &str,
    ) -> Result<StudentCheckIn, CoordinatorError> {
        student.require_student()?;
        let now = self.clock.now();
        let mut tx = self.database.begin().await?;
        // Taken before the application row, matching activity deletion
        let activity = tx
            .lock_activity(activity_id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("activity", activity_id))?;

        let approved = tx
            .find_active_application(activity_id, student.user_id)
            .await?
            .is_some_and(|a| a.status == ApplicationStatus::Approved);
        if !approved {
            return Err(CoordinatorError::NoApprovedApplication);
        }

        let existing = tx.find_student_check_in(activity_id, student.user_id).await?;
        if existing.as_ref().is_some_and(StudentCheckIn::is_present) {
            return Err(CoordinatorError::AlreadyCheckedIn);
        }

        match self.codes.current_code(tx.as_mut(), activity_id).await? {
            Some(code) if code.code.matches(submitted_code) => {}
            _ => {
                debug!(
                    activity_id = %activity_id,
                    student_id = %student.user_id,
                    "Check-in code mismatch"
                );
                metrics::counter!("volunteer_check_in_code_failures_total").increment(1);
                return Err(CoordinatorError::InvalidCode);
            }
        }

        match activity.time_window(now) {
            TimeWindow::BeforeStart => return Err(CoordinatorError::NotStartedYet),
            TimeWindow::AfterEnd => return Err(CoordinatorError::AlreadyEnded),
            TimeWindow::Within => {}
        }

        let record = match existing {
            Some(mut absent) => {
                absent.mark_present(now);
                absent
            }
            None => StudentCheckIn::present(activity_id, student.user_id, now),
        };
        let stored = tx.upsert_student_check_in(&record).await?;
        tx.commit().await?;

        info!(activity_id = %activity_id, student_id = %student.user_id, "Student checked in");
        metrics::counter!("volunteer_check_ins_total").increment(1);
        self.event_bus.publish_attendance_event(AttendanceEvent::StudentCheckedIn {
            activity_id,
            student_id: student.user_id,
            checked_in_at: now,
        });
        Ok(stored)
    }

    async fn mark_absent(&self, activity_id: ActivityId) -> Result<usize, CoordinatorError> {
        let (_, created) = self.record_absences(activity_id, false).await?;
        Ok(created)
    }

    async fn mark_absent_as(
        &self,
        actor: &Actor,
        activity_id: ActivityId,
    ) -> Result<usize, CoordinatorError> {
        {
            let mut tx = self.database.begin().await?;
            let activity = Self::find_activity(tx.as_mut(), activity_id).await?;
            actor.require_manager_of(&activity.organization)?;
        }
        self.mark_absent(activity_id).await
    }

    async fn list_check_ins(
        &self,
        actor: &Actor,
        activity_id: ActivityId,
    ) -> Result<Vec<StudentCheckIn>, CoordinatorError> {
        let mut tx = self.database.begin().await?;
        let activity = Self::find_activity(tx.as_mut(), activity_id).await?;
        actor.require_manager_of(&activity.organization)?;
        Ok(tx.list_student_check_ins(activity_id).await?)
    }

    async fn my_status(
        &self,
        student: &Actor,
        activity_id: ActivityId,
    ) -> Result<Option<StudentCheckIn>, CoordinatorError> {
        student.require_student()?;
        let mut tx = self.database.begin().await?;
        Ok(tx.find_student_check_in(activity_id, student.user_id).await?)
    }

    async fn sweep_absences(
        &self,
        lookback_days: u32,
        dry_run: bool,
    ) -> Result<AbsenceSweepReport, CoordinatorError> {
        let window_end = self.clock.now();
        let window_start = Duration::try_days(i64::from(lookback_days))
            .and_then(|lookback| window_end.checked_sub_signed(lookback))
            .ok_or_else(|| {
                CoordinatorError::validation(format!(
                    "absence lookback of {} days is out of range",
                    lookback_days
                ))
            })?;

        // Activities that just ended are still During until refreshed. A dry
        // run derives the status in memory instead of persisting it.
        if !dry_run {
            self.status_engine.refresh_all().await?;
        }

        let completed: Vec<Activity> = {
            let mut tx = self.database.begin().await?;
            let mut statuses = ActivityStatus::AUTO_MANAGED.to_vec();
            statuses.push(ActivityStatus::Complete);
            let filter = ActivityFilter {
                statuses: Some(statuses),
                ended_between: Some((window_start, window_end)),
                ..Default::default()
            };
            tx.list_activities(&filter)
                .await?
                .into_iter()
                .filter(|a| self.status_engine.derive(a, window_end) == ActivityStatus::Complete)
                .collect()
        };
        debug!(activities = completed.len(), dry_run, "Sweeping absences");

        let mut activities = Vec::with_capacity(completed.len());
        for activity in completed {
            let (activity, absent) = self.record_absences(activity.id, dry_run).await?;
            activities.push(ActivityAbsences {
                activity_id: activity.id,
                title: activity.title,
                end_at: activity.end_at,
                absent,
            });
        }

        let report = AbsenceSweepReport {
            window_start,
            window_end,
            dry_run,
            activities,
        };
        info!(
            activities = report.activities.len(),
            absent = report.total(),
            dry_run,
            "Absence sweep complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::application_workflow::{ApplicationService, StandardApplicationService};
    use crate::domain::check_in::{AttendanceStatus, CheckInCode, CodeGenerator};
    use crate::domain::clock::FixedClock;
    use crate::infrastructure::repositories::InMemoryDatabase;
    use chrono::{FixedOffset, TimeZone};

    struct FixedCode;

    impl CodeGenerator for FixedCode {
        fn generate(&self) -> CheckInCode {
            CheckInCode::parse("QZ0042").unwrap()
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap()
    }

    struct Fixture {
        database: Arc<InMemoryDatabase>,
        attendance: StandardCheckInService,
        applications: StandardApplicationService,
        clock: Arc<FixedClock>,
        organizer: Actor,
        activity: Activity,
    }

    /// Open activity starting in two days, running from 09:00 to 12:00
    async fn fixture() -> Fixture {
        let database = Arc::new(InMemoryDatabase::new());
        let clock = Arc::new(FixedClock::new(t0()));
        let event_bus = Arc::new(EventBus::new(64));
        let engine = Arc::new(StatusEngine::new(
            database.clone(),
            clock.clone(),
            Duration::days(7),
            event_bus.clone(),
        ));
        let codes = CheckInCodeManager::with_generator(
            clock.clone(),
            FixedOffset::east_opt(0).unwrap(),
            Arc::new(FixedCode),
        );
        let attendance = StandardCheckInService::new(
            database.clone(),
            clock.clone(),
            codes,
            engine.clone(),
            event_bus.clone(),
        );
        let applications =
            StandardApplicationService::new(database.clone(), clock.clone(), engine, event_bus);

        let organizer = Actor::organizer(UserId::new(), "Faculty of Science");
        let start = t0() + Duration::days(2) + Duration::hours(1);
        let activity = Activity {
            id: ActivityId::new(),
            organizer_id: organizer.user_id,
            organization: "Faculty of Science".to_string(),
            title: "Tree planting".to_string(),
            description: String::new(),
            location: "North field".to_string(),
            categories: vec!["Environment".to_string()],
            start_at: start,
            end_at: start + Duration::hours(3),
            max_participants: None,
            current_participants: 0,
            status: ActivityStatus::Open,
            hours_awarded: Some(3.0),
            rejection_reason: None,
            created_at: t0(),
            updated_at: t0(),
        };
        let mut tx = database.begin().await.unwrap();
        tx.insert_activity(&activity).await.unwrap();
        tx.commit().await.unwrap();

        Fixture {
            database,
            attendance,
            applications,
            clock,
            organizer,
            activity,
        }
    }

    async fn approved_student(fx: &Fixture) -> Actor {
        let student = Actor::student(UserId::new());
        let application = fx.applications.submit(&student, fx.activity.id).await.unwrap();
        fx.applications.approve(&fx.organizer, application.id).await.unwrap();
        student
    }

    async fn stored_status(fx: &Fixture) -> ActivityStatus {
        let mut tx = fx.database.begin().await.unwrap();
        tx.find_activity(fx.activity.id).await.unwrap().unwrap().status
    }

    #[tokio::test]
    async fn test_check_in_requires_approved_application() {
        let fx = fixture().await;
        let student = Actor::student(UserId::new());
        fx.applications.submit(&student, fx.activity.id).await.unwrap();

        assert!(matches!(
            fx.attendance.check_in(&student, fx.activity.id, "QZ0042").await,
            Err(CoordinatorError::NoApprovedApplication)
        ));
    }

    #[tokio::test]
    async fn test_check_in_validates_code_before_time_window() {
        let fx = fixture().await;
        let student = approved_student(&fx).await;

        // No code issued yet
        assert!(matches!(
            fx.attendance.check_in(&student, fx.activity.id, "QZ0042").await,
            Err(CoordinatorError::InvalidCode)
        ));

        fx.attendance
            .get_or_create_today_code(&fx.organizer, fx.activity.id)
            .await
            .unwrap();
        assert!(matches!(
            fx.attendance.check_in(&student, fx.activity.id, "QZ0042").await,
            Err(CoordinatorError::NotStartedYet)
        ));
    }

    #[tokio::test]
    async fn test_check_in_once_then_already_checked_in() {
        let fx = fixture().await;
        let student = approved_student(&fx).await;

        fx.clock.set(fx.activity.start_at + Duration::minutes(5));
        fx.attendance
            .get_or_create_today_code(&fx.organizer, fx.activity.id)
            .await
            .unwrap();

        let record = fx.attendance.check_in(&student, fx.activity.id, " qz0042 ").await.unwrap();
        assert_eq!(record.attendance_status, AttendanceStatus::Present);
        assert_eq!(record.checked_in_at, Some(fx.clock.now()));

        assert!(matches!(
            fx.attendance.check_in(&student, fx.activity.id, "QZ0042").await,
            Err(CoordinatorError::AlreadyCheckedIn)
        ));
        let status = fx.attendance.my_status(&student, fx.activity.id).await.unwrap();
        assert!(status.is_some_and(|s| s.is_present()));
    }

    #[tokio::test]
    async fn test_absent_student_may_still_check_in() {
        let fx = fixture().await;
        let student = approved_student(&fx).await;

        fx.clock.set(fx.activity.start_at + Duration::minutes(30));
        assert_eq!(fx.attendance.mark_absent(fx.activity.id).await.unwrap(), 1);

        fx.attendance
            .get_or_create_today_code(&fx.organizer, fx.activity.id)
            .await
            .unwrap();
        let record = fx.attendance.check_in(&student, fx.activity.id, "QZ0042").await.unwrap();
        assert!(record.is_present());
        assert!(record.marked_absent_at.is_none());

        let all = fx.attendance.list_check_ins(&fx.organizer, fx.activity.id).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_code_issuance_scoped_to_organization() {
        let fx = fixture().await;
        let outsider = Actor::organizer(UserId::new(), "Faculty of Arts");
        assert!(matches!(
            fx.attendance.get_or_create_today_code(&outsider, fx.activity.id).await,
            Err(CoordinatorError::PermissionDenied(_))
        ));
        assert!(fx.attendance.mark_absent_as(&outsider, fx.activity.id).await.is_err());
        assert!(fx
            .attendance
            .get_or_create_today_code(&Actor::admin(UserId::new()), fx.activity.id)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_sweep_absences_dry_run_writes_nothing() {
        let fx = fixture().await;
        approved_student(&fx).await;
        approved_student(&fx).await;

        let before = stored_status(&fx).await;
        assert_eq!(before, ActivityStatus::Upcoming);

        fx.clock.set(fx.activity.end_at + Duration::hours(1));
        let preview = fx.attendance.sweep_absences(7, true).await.unwrap();
        assert!(preview.dry_run);
        assert_eq!(preview.total(), 2);
        // Completion is derived, not persisted
        assert_eq!(stored_status(&fx).await, before);
        assert!(fx
            .attendance
            .list_check_ins(&fx.organizer, fx.activity.id)
            .await
            .unwrap()
            .is_empty());

        let report = fx.attendance.sweep_absences(7, false).await.unwrap();
        assert_eq!(report.activities.len(), 1);
        assert_eq!(report.total(), 2);
        assert_eq!(fx.attendance.sweep_absences(7, false).await.unwrap().total(), 0);

        // Outside the lookback window
        fx.clock.advance(Duration::days(8));
        assert!(fx.attendance.sweep_absences(7, false).await.unwrap().activities.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_absences_rejects_unrepresentable_lookback() {
        let fx = fixture().await;
        approved_student(&fx).await;
        fx.clock.set(fx.activity.end_at + Duration::hours(1));

        assert!(matches!(
            fx.attendance.sweep_absences(u32::MAX, false).await,
            Err(CoordinatorError::Validation(_))
        ));
        // Nothing was refreshed before the range check failed
        assert_eq!(stored_status(&fx).await, ActivityStatus::Upcoming);
    }
}
