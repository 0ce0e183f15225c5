// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Check-In Code Manager
//!
//! Issues at most one code per activity per calendar day. "Today" is the
//! date of the injected clock seen from the configured UTC offset, so the
//! same code is returned for the whole local day and a fresh one the next.

use chrono::{FixedOffset, NaiveDate};
use std::sync::Arc;
use tracing::debug;

use crate::domain::activity::ActivityId;
use crate::domain::check_in::{CodeGenerator, DailyCheckInCode, RandomCodeGenerator};
use crate::domain::clock::{local_date, Clock};
use crate::domain::error::CoordinatorError;
use crate::domain::repository::UnitOfWork;

pub struct CheckInCodeManager {
    clock: Arc<dyn Clock>,
    utc_offset: FixedOffset,
    generator: Arc<dyn CodeGenerator>,
}

impl CheckInCodeManager {
    pub fn new(clock: Arc<dyn Clock>, utc_offset: FixedOffset) -> Self {
        Self::with_generator(clock, utc_offset, Arc::new(RandomCodeGenerator))
    }

    pub fn with_generator(
        clock: Arc<dyn Clock>,
        utc_offset: FixedOffset,
        generator: Arc<dyn CodeGenerator>,
    ) -> Self {
        Self {
            clock,
            utc_offset,
            generator,
        }
    }

    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset
    }

    pub fn today(&self) -> NaiveDate {
        local_date(self.clock.now(), self.utc_offset)
    }

    pub fn is_valid_today(&self, code: &DailyCheckInCode) -> bool {
        code.is_valid_on(self.today())
    }

    /// Today's code for the activity, if one was issued
    pub async fn current_code(
        &self,
        tx: &mut dyn UnitOfWork,
        activity_id: ActivityId,
    ) -> Result<Option<DailyCheckInCode>, CoordinatorError> {
        Ok(tx.find_check_in_code(activity_id, self.today()).await?)
    }

    /// Today's code, generating and storing one on first request. Returns
    /// the code and whether this call issued it. A concurrent issuer that
    /// stored first wins and its code is returned.
    pub async fn get_or_create_today_code(
        &self,
        tx: &mut dyn UnitOfWork,
        activity_id: ActivityId,
    ) -> Result<(DailyCheckInCode, bool), CoordinatorError> {
        let today = self.today();
        if let Some(existing) = tx.find_check_in_code(activity_id, today).await? {
            return Ok((existing, false));
        }

        let candidate =
            DailyCheckInCode::new(activity_id, self.generator.generate(), today, self.clock.now());
        let stored = tx.insert_check_in_code_if_absent(&candidate).await?;
        let issued = stored.id == candidate.id;
        debug!(activity_id = %activity_id, valid_date = %today, issued, "Check-in code resolved");
        Ok((stored, issued))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::activity::{Activity, ActivityStatus};
    use crate::domain::actor::UserId;
    use crate::domain::check_in::CheckInCode;
    use crate::domain::clock::FixedClock;
    use crate::domain::repository::Database;
    use crate::infrastructure::repositories::InMemoryDatabase;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use parking_lot::Mutex;

    /// Hands out a scripted sequence of codes
    struct ScriptedGenerator(Mutex<Vec<&'static str>>);

    impl CodeGenerator for ScriptedGenerator {
        fn generate(&self) -> CheckInCode {
            let next = self.0.lock().remove(0);
            CheckInCode::parse(next).unwrap()
        }
    }

    fn morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap()
    }

    async fn seeded() -> (InMemoryDatabase, ActivityId) {
        let db = InMemoryDatabase::new();
        let activity = Activity {
            id: ActivityId::new(),
            organizer_id: UserId::new(),
            organization: "Faculty of Science".to_string(),
            title: "Blood drive".to_string(),
            description: String::new(),
            location: "Gym".to_string(),
            categories: vec!["Health".to_string()],
            start_at: morning(),
            end_at: morning() + Duration::days(2),
            max_participants: None,
            current_participants: 0,
            status: ActivityStatus::During,
            hours_awarded: None,
            rejection_reason: None,
            created_at: morning(),
            updated_at: morning(),
        };
        let mut tx = db.begin().await.unwrap();
        tx.insert_activity(&activity).await.unwrap();
        tx.commit().await.unwrap();
        (db, activity.id)
    }

    #[tokio::test]
    async fn test_same_code_all_day_new_code_next_day() {
        let (db, activity_id) = seeded().await;
        let clock = Arc::new(FixedClock::new(morning()));
        let manager = CheckInCodeManager::with_generator(
            clock.clone(),
            FixedOffset::east_opt(0).unwrap(),
            Arc::new(ScriptedGenerator(Mutex::new(vec!["AB1234", "CD5678"]))),
        );

        let mut tx = db.begin().await.unwrap();
        let (first, issued) = manager
            .get_or_create_today_code(tx.as_mut(), activity_id)
            .await
            .unwrap();
        assert!(issued);
        assert_eq!(first.code.as_str(), "AB1234");

        clock.advance(Duration::hours(10));
        let (again, issued) = manager
            .get_or_create_today_code(tx.as_mut(), activity_id)
            .await
            .unwrap();
        assert!(!issued);
        assert_eq!(again.code, first.code);
        assert!(manager.is_valid_today(&again));

        clock.advance(Duration::hours(6));
        assert!(!manager.is_valid_today(&again));
        assert!(manager.current_code(tx.as_mut(), activity_id).await.unwrap().is_none());
        let (next_day, _) = manager
            .get_or_create_today_code(tx.as_mut(), activity_id)
            .await
            .unwrap();
        assert_eq!(next_day.code.as_str(), "CD5678");
        assert_eq!(next_day.valid_date, first.valid_date.succ_opt().unwrap());
    }

    #[tokio::test]
    async fn test_today_follows_configured_offset() {
        // 20:00 UTC is already the next day at UTC+7
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 5, 1, 20, 0, 0).unwrap()));
        let utc = CheckInCodeManager::new(clock.clone(), FixedOffset::east_opt(0).unwrap());
        let bangkok = CheckInCodeManager::new(clock, FixedOffset::east_opt(7 * 3600).unwrap());

        assert_eq!(utc.today(), NaiveDate::from_ymd_opt(2026, 5, 1).unwrap());
        assert_eq!(bangkok.today(), NaiveDate::from_ymd_opt(2026, 5, 2).unwrap());
    }
}
