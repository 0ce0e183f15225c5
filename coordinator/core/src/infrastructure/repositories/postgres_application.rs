// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Application Repository
//!
//! `ApplicationRepository` over the `applications` table. The partial unique
//! index `uq_applications_active` rejects a second live application for the
//! same (activity, student); the violation surfaces as
//! `RepositoryError::UniqueViolation`.

use async_trait::async_trait;
use uuid::Uuid;

use super::postgres::{parse_application_row, PostgresUnitOfWork, APPLICATION_COLUMNS};
use crate::domain::activity::ActivityId;
use crate::domain::actor::UserId;
use crate::domain::application::{Application, ApplicationId};
use crate::domain::repository::{ApplicationFilter, ApplicationRepository, RepositoryError};

#[async_trait]
impl ApplicationRepository for PostgresUnitOfWork {
    async fn insert_application(
        &mut self,
        application: &Application,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO applications (
                id, activity_id, student_id, status, applied_at, decision_at,
                decision_by, notes, snapshot_activity_id, snapshot_title
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(application.id.0)
        .bind(application.activity_id.map(|id| id.0))
        .bind(application.student_id.0)
        .bind(application.status.as_str())
        .bind(application.applied_at)
        .bind(application.decision_at)
        .bind(application.decision_by.map(|id| id.0))
        .bind(&application.notes)
        .bind(application.snapshot.activity_id.0)
        .bind(&application.snapshot.title)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_application(
        &mut self,
        application: &Application,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE applications SET
                status = $2,
                decision_at = $3,
                decision_by = $4,
                notes = $5
            WHERE id = $1
            "#,
        )
        .bind(application.id.0)
        .bind(application.status.as_str())
        .bind(application.decision_at)
        .bind(application.decision_by.map(|id| id.0))
        .bind(&application.notes)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("application {}", application.id)));
        }
        Ok(())
    }

    async fn find_application(
        &mut self,
        id: ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM applications WHERE id = $1",
            APPLICATION_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(parse_application_row).transpose()
    }

    async fn lock_application(
        &mut self,
        id: ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM applications WHERE id = $1 FOR UPDATE",
            APPLICATION_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(parse_application_row).transpose()
    }

    async fn find_active_application(
        &mut self,
        activity_id: ActivityId,
        student_id: UserId,
    ) -> Result<Option<Application>, RepositoryError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM applications
            WHERE activity_id = $1 AND student_id = $2 AND status <> 'cancelled'
            FOR UPDATE
            "#,
            APPLICATION_COLUMNS
        ))
        .bind(activity_id.0)
        .bind(student_id.0)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(parse_application_row).transpose()
    }

    async fn list_applications(
        &mut self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, RepositoryError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM applications
            WHERE ($1::uuid IS NULL OR activity_id = $1)
              AND ($2::uuid IS NULL OR student_id = $2)
              AND ($3::text IS NULL OR activity_id IN (
                    SELECT id FROM activities WHERE organization = $3
                  ))
              AND ($4::text IS NULL OR status = $4)
            ORDER BY applied_at DESC
            "#,
            APPLICATION_COLUMNS
        ))
        .bind(filter.activity_id.map(|id| id.0))
        .bind(filter.student_id.map(|id| id.0))
        .bind(&filter.organization)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(parse_application_row).collect()
    }

    async fn approved_student_ids(
        &mut self,
        activity_id: ActivityId,
    ) -> Result<Vec<UserId>, RepositoryError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT student_id
            FROM applications
            WHERE activity_id = $1 AND status = 'approved'
            ORDER BY applied_at ASC
            "#,
        )
        .bind(activity_id.0)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(ids.into_iter().map(UserId).collect())
    }
}
