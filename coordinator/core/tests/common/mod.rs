// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared harness for coordinator integration tests: an in-memory database,
//! a manually driven clock and a deterministic code generator.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use volunteer_core::application::{Coordinator, CoordinatorSettings};
use volunteer_core::domain::activity::{Activity, ActivityDraft, ModerationDecision};
use volunteer_core::domain::actor::{Actor, UserId};
use volunteer_core::domain::application::Application;
use volunteer_core::domain::check_in::{CheckInCode, CodeGenerator};
use volunteer_core::domain::clock::{Clock, FixedClock};
use volunteer_core::domain::repository::Database;
use volunteer_core::infrastructure::repositories::InMemoryDatabase;

pub const ORGANIZATION: &str = "Faculty of Science";

/// Issues AB0001, AB0002, ... so every day gets a distinct code
#[derive(Default)]
pub struct SequentialCodes(AtomicU32);

impl CodeGenerator for SequentialCodes {
    fn generate(&self) -> CheckInCode {
        let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        CheckInCode::parse(&format!("AB{:04}", n)).expect("well-formed code")
    }
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 6, 8, 0, 0).unwrap()
}

pub struct Harness {
    pub coordinator: Coordinator,
    pub clock: Arc<FixedClock>,
    pub organizer: Actor,
    pub admin: Actor,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_database(Arc::new(InMemoryDatabase::new()))
    }

    pub fn with_database(database: Arc<dyn Database>) -> Self {
        let clock = Arc::new(FixedClock::new(epoch()));
        let coordinator = Coordinator::builder(database)
            .with_settings(CoordinatorSettings::default())
            .with_clock(clock.clone())
            .with_code_generator(Arc::new(SequentialCodes::default()))
            .build();

        Self {
            coordinator,
            clock,
            organizer: Actor::organizer(UserId::new(), ORGANIZATION),
            admin: Actor::admin(UserId::new()),
        }
    }

    /// Post and approve an activity starting `start_in` from now
    pub async fn published_activity(
        &self,
        start_in: Duration,
        length: Duration,
        max_participants: Option<u32>,
    ) -> Activity {
        let now = self.clock.now();
        let draft = ActivityDraft {
            title: "Community garden".to_string(),
            description: "Weeding and watering".to_string(),
            location: "East campus".to_string(),
            categories: vec!["University Activities".to_string()],
            start_at: now + start_in,
            end_at: now + start_in + length,
            max_participants,
            hours_awarded: Some(2.0),
            organization: None,
        };
        let activity = self
            .coordinator
            .activities
            .create(&self.organizer, draft)
            .await
            .expect("create activity");
        self.coordinator
            .activities
            .moderate(&self.admin, activity.id, ModerationDecision::Approve)
            .await
            .expect("approve activity")
    }

    pub async fn apply(&self, activity: &Activity) -> (Actor, Application) {
        let student = Actor::student(UserId::new());
        let application = self
            .coordinator
            .applications
            .submit(&student, activity.id)
            .await
            .expect("submit application");
        (student, application)
    }

    /// A student with an approved application for the activity
    pub async fn enrolled(&self, activity: &Activity) -> Actor {
        let (student, application) = self.apply(activity).await;
        self.coordinator
            .applications
            .approve(&self.organizer, application.id)
            .await
            .expect("approve application");
        student
    }
}
