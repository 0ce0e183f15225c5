// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Deletion Request Repository

use async_trait::async_trait;

use super::postgres::{parse_deletion_request_row, PostgresUnitOfWork, DELETION_REQUEST_COLUMNS};
use crate::domain::deletion_request::{
    ActivityDeletionRequest, DeletionRequestId, DeletionRequestStatus,
};
use crate::domain::repository::{DeletionRequestRepository, RepositoryError};

#[async_trait]
impl DeletionRequestRepository for PostgresUnitOfWork {
    async fn insert_deletion_request(
        &mut self,
        request: &ActivityDeletionRequest,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO activity_deletion_requests (
                id, activity_id, snapshot_activity_id, snapshot_title, organization,
                requested_by, reason, status, created_at, reviewed_by, reviewed_at, review_note
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(request.id.0)
        .bind(request.activity_id.map(|id| id.0))
        .bind(request.snapshot.activity_id.0)
        .bind(&request.snapshot.title)
        .bind(&request.organization)
        .bind(request.requested_by.0)
        .bind(&request.reason)
        .bind(request.status.as_str())
        .bind(request.created_at)
        .bind(request.reviewed_by.map(|id| id.0))
        .bind(request.reviewed_at)
        .bind(&request.review_note)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_deletion_request(
        &mut self,
        request: &ActivityDeletionRequest,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE activity_deletion_requests SET
                activity_id = $2,
                status = $3,
                reviewed_by = $4,
                reviewed_at = $5,
                review_note = $6
            WHERE id = $1
            "#,
        )
        .bind(request.id.0)
        .bind(request.activity_id.map(|id| id.0))
        .bind(request.status.as_str())
        .bind(request.reviewed_by.map(|id| id.0))
        .bind(request.reviewed_at)
        .bind(&request.review_note)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("deletion request {}", request.id)));
        }
        Ok(())
    }

    async fn find_deletion_request(
        &mut self,
        id: DeletionRequestId,
    ) -> Result<Option<ActivityDeletionRequest>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM activity_deletion_requests WHERE id = $1",
            DELETION_REQUEST_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(parse_deletion_request_row).transpose()
    }

    async fn lock_deletion_request(
        &mut self,
        id: DeletionRequestId,
    ) -> Result<Option<ActivityDeletionRequest>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM activity_deletion_requests WHERE id = $1 FOR UPDATE",
            DELETION_REQUEST_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(parse_deletion_request_row).transpose()
    }

    async fn list_deletion_requests(
        &mut self,
        status: Option<DeletionRequestStatus>,
    ) -> Result<Vec<ActivityDeletionRequest>, RepositoryError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM activity_deletion_requests
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#,
            DELETION_REQUEST_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(parse_deletion_request_row).collect()
    }
}
