// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Activity Repository
//!
//! `ActivityRepository` over the `activities` table. Seat accounting is done
//! with single conditional `UPDATE ... RETURNING` statements so concurrent
//! reservations can never push `current_participants` past the maximum.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use super::postgres::{parse_activity_row, to_db_count, PostgresUnitOfWork, ACTIVITY_COLUMNS};
use crate::domain::activity::{Activity, ActivityId, ActivityStatus};
use crate::domain::repository::{
    ActivityFilter, ActivityRepository, RepositoryError, SeatReservation, StatusChange,
};

fn status_strings(statuses: &[ActivityStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

#[async_trait]
impl ActivityRepository for PostgresUnitOfWork {
    async fn insert_activity(&mut self, activity: &Activity) -> Result<(), RepositoryError> {
        let max_participants = activity.max_participants.map(to_db_count).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO activities (
                id, organizer_id, organization, title, description, location,
                categories, start_at, end_at, max_participants, current_participants,
                status, hours_awarded, rejection_reason, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(activity.id.0)
        .bind(activity.organizer_id.0)
        .bind(&activity.organization)
        .bind(&activity.title)
        .bind(&activity.description)
        .bind(&activity.location)
        .bind(&activity.categories)
        .bind(activity.start_at)
        .bind(activity.end_at)
        .bind(max_participants)
        .bind(to_db_count(activity.current_participants)?)
        .bind(activity.status.as_str())
        .bind(activity.hours_awarded)
        .bind(&activity.rejection_reason)
        .bind(activity.created_at)
        .bind(activity.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_activity(&mut self, activity: &Activity) -> Result<(), RepositoryError> {
        let max_participants = activity.max_participants.map(to_db_count).transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE activities SET
                title = $2,
                description = $3,
                location = $4,
                categories = $5,
                start_at = $6,
                end_at = $7,
                max_participants = $8,
                status = $9,
                hours_awarded = $10,
                rejection_reason = $11,
                updated_at = $12
            WHERE id = $1
            "#,
        )
        .bind(activity.id.0)
        .bind(&activity.title)
        .bind(&activity.description)
        .bind(&activity.location)
        .bind(&activity.categories)
        .bind(activity.start_at)
        .bind(activity.end_at)
        .bind(max_participants)
        .bind(activity.status.as_str())
        .bind(activity.hours_awarded)
        .bind(&activity.rejection_reason)
        .bind(activity.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("activity {}", activity.id)));
        }
        Ok(())
    }

    async fn update_activity_status(
        &mut self,
        id: ActivityId,
        status: ActivityStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE activities SET status = $2 WHERE id = $1")
            .bind(id.0)
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("activity {}", id)));
        }
        Ok(())
    }

    async fn find_activity(&mut self, id: ActivityId) -> Result<Option<Activity>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM activities WHERE id = $1", ACTIVITY_COLUMNS))
            .bind(id.0)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(parse_activity_row).transpose()
    }

    async fn lock_activity(&mut self, id: ActivityId) -> Result<Option<Activity>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM activities WHERE id = $1 FOR UPDATE",
            ACTIVITY_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(parse_activity_row).transpose()
    }

    async fn list_activities(
        &mut self,
        filter: &ActivityFilter,
    ) -> Result<Vec<Activity>, RepositoryError> {
        let statuses = filter.statuses.as_deref().map(status_strings);
        let excluded = status_strings(&filter.excluded_statuses);
        let ids: Option<Vec<Uuid>> = filter
            .ids
            .as_ref()
            .map(|ids| ids.iter().map(|id| id.0).collect());
        let (ended_from, ended_to): (Option<DateTime<Utc>>, Option<DateTime<Utc>>) =
            match filter.ended_between {
                Some((from, to)) => (Some(from), Some(to)),
                None => (None, None),
            };

        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM activities
            WHERE ($1::text[] IS NULL OR status = ANY($1))
              AND NOT (status = ANY($2::text[]))
              AND ($3::text IS NULL OR organization = $3)
              AND ($4::uuid[] IS NULL OR id = ANY($4))
              AND ($5::timestamptz IS NULL OR end_at >= $5)
              AND ($6::timestamptz IS NULL OR end_at < $6)
            ORDER BY start_at ASC, created_at ASC
            "#,
            ACTIVITY_COLUMNS
        ))
        .bind(statuses)
        .bind(excluded)
        .bind(&filter.organization)
        .bind(ids)
        .bind(ended_from)
        .bind(ended_to)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(parse_activity_row).collect()
    }

    async fn delete_activity(&mut self, id: ActivityId) -> Result<bool, RepositoryError> {
        // Foreign keys null out dependent live references and cascade to
        // codes and check-ins
        let result = sqlx::query("DELETE FROM activities WHERE id = $1")
            .bind(id.0)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn try_reserve_seat(
        &mut self,
        id: ActivityId,
    ) -> Result<SeatReservation, RepositoryError> {
        let row = sqlx::query(
            r#"
            UPDATE activities
            SET current_participants = current_participants + 1
            WHERE id = $1
              AND (max_participants IS NULL OR current_participants < max_participants)
            RETURNING current_participants
            "#,
        )
        .bind(id.0)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => {
                let count: i32 = row.try_get("current_participants")?;
                Ok(SeatReservation::Reserved(count.max(0) as u32))
            }
            None => {
                let exists: Option<Uuid> =
                    sqlx::query_scalar("SELECT id FROM activities WHERE id = $1")
                        .bind(id.0)
                        .fetch_optional(&mut *self.tx)
                        .await?;
                if exists.is_none() {
                    return Err(RepositoryError::NotFound(format!("activity {}", id)));
                }
                Ok(SeatReservation::Full)
            }
        }
    }

    async fn release_seat(&mut self, id: ActivityId) -> Result<u32, RepositoryError> {
        let count: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE activities
            SET current_participants = GREATEST(current_participants - 1, 0)
            WHERE id = $1
            RETURNING current_participants
            "#,
        )
        .bind(id.0)
        .fetch_optional(&mut *self.tx)
        .await?;

        match count {
            Some(count) => Ok(count.max(0) as u32),
            None => Err(RepositoryError::NotFound(format!("activity {}", id))),
        }
    }

    async fn refresh_statuses(
        &mut self,
        now: DateTime<Utc>,
        upcoming_window: Duration,
    ) -> Result<Vec<StatusChange>, RepositoryError> {
        // Same priority ordering as `derive_status`
        let rows = sqlx::query(
            r#"
            UPDATE activities a
            SET status = d.next_status
            FROM (
                SELECT
                    id,
                    status AS prev_status,
                    CASE
                        WHEN $1 > end_at THEN 'complete'
                        WHEN max_participants IS NOT NULL
                             AND current_participants >= max_participants THEN 'full'
                        WHEN start_at <= $1 THEN 'during'
                        WHEN start_at - $1 < ($2::bigint * INTERVAL '1 second') THEN 'upcoming'
                        ELSE 'open'
                    END AS next_status
                FROM activities
                WHERE status = ANY($3::text[])
                FOR UPDATE
            ) d
            WHERE a.id = d.id AND a.status <> d.next_status
            RETURNING a.id, d.prev_status, d.next_status
            "#,
        )
        .bind(now)
        .bind(upcoming_window.num_seconds())
        .bind(status_strings(&ActivityStatus::AUTO_MANAGED))
        .fetch_all(&mut *self.tx)
        .await?;

        let mut changes = Vec::with_capacity(rows.len());
        for row in rows {
            let from: String = row.try_get("prev_status")?;
            let to: String = row.try_get("next_status")?;
            changes.push(StatusChange {
                activity_id: ActivityId(row.try_get("id")?),
                from: from.parse().map_err(RepositoryError::Serialization)?,
                to: to.parse().map_err(RepositoryError::Serialization)?,
            });
        }

        debug!(changed = changes.len(), "Bulk status refresh applied");
        Ok(changes)
    }
}
