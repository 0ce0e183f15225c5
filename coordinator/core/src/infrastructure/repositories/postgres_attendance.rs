// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Attendance Repository
//!
//! Daily check-in codes and student check-ins. Both tables carry a unique
//! key that concurrent writers race on; losers fall through `ON CONFLICT`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::postgres::{
    parse_check_in_code_row, parse_check_in_row, PostgresUnitOfWork, CHECK_IN_COLUMNS,
};
use crate::domain::activity::ActivityId;
use crate::domain::actor::UserId;
use crate::domain::check_in::{AttendanceStatus, DailyCheckInCode, StudentCheckIn};
use crate::domain::repository::{AttendanceRepository, RepositoryError};

#[async_trait]
impl AttendanceRepository for PostgresUnitOfWork {
    async fn find_check_in_code(
        &mut self,
        activity_id: ActivityId,
        valid_date: NaiveDate,
    ) -> Result<Option<DailyCheckInCode>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, activity_id, code, valid_date, created_at
            FROM daily_check_in_codes
            WHERE activity_id = $1 AND valid_date = $2
            "#,
        )
        .bind(activity_id.0)
        .bind(valid_date)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(parse_check_in_code_row).transpose()
    }

    async fn insert_check_in_code_if_absent(
        &mut self,
        code: &DailyCheckInCode,
    ) -> Result<DailyCheckInCode, RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO daily_check_in_codes (id, activity_id, code, valid_date, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (activity_id, valid_date) DO NOTHING
            "#,
        )
        .bind(code.id)
        .bind(code.activity_id.0)
        .bind(code.code.as_str())
        .bind(code.valid_date)
        .bind(code.created_at)
        .execute(&mut *self.tx)
        .await?;

        // Re-read so a concurrent winner's code is returned
        self.find_check_in_code(code.activity_id, code.valid_date)
            .await?
            .ok_or_else(|| {
                RepositoryError::NotFound(format!(
                    "check-in code for activity {} on {}",
                    code.activity_id, code.valid_date
                ))
            })
    }

    async fn find_student_check_in(
        &mut self,
        activity_id: ActivityId,
        student_id: UserId,
    ) -> Result<Option<StudentCheckIn>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM student_check_ins WHERE activity_id = $1 AND student_id = $2",
            CHECK_IN_COLUMNS
        ))
        .bind(activity_id.0)
        .bind(student_id.0)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(parse_check_in_row).transpose()
    }

    async fn upsert_student_check_in(
        &mut self,
        check_in: &StudentCheckIn,
    ) -> Result<StudentCheckIn, RepositoryError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO student_check_ins (
                id, activity_id, student_id, attendance_status, checked_in_at, marked_absent_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (activity_id, student_id) DO UPDATE SET
                attendance_status = EXCLUDED.attendance_status,
                checked_in_at = EXCLUDED.checked_in_at,
                marked_absent_at = EXCLUDED.marked_absent_at
            RETURNING {}
            "#,
            CHECK_IN_COLUMNS
        ))
        .bind(check_in.id.0)
        .bind(check_in.activity_id.0)
        .bind(check_in.student_id.0)
        .bind(check_in.attendance_status.as_str())
        .bind(check_in.checked_in_at)
        .bind(check_in.marked_absent_at)
        .fetch_one(&mut *self.tx)
        .await?;

        parse_check_in_row(&row)
    }

    async fn list_student_check_ins(
        &mut self,
        activity_id: ActivityId,
    ) -> Result<Vec<StudentCheckIn>, RepositoryError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM student_check_ins
            WHERE activity_id = $1
            ORDER BY COALESCE(checked_in_at, marked_absent_at) ASC
            "#,
            CHECK_IN_COLUMNS
        ))
        .bind(activity_id.0)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(parse_check_in_row).collect()
    }

    async fn insert_absences(
        &mut self,
        activity_id: ActivityId,
        student_ids: &[UserId],
        marked_at: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        if student_ids.is_empty() {
            return Ok(0);
        }

        let ids: Vec<Uuid> = student_ids.iter().map(|_| Uuid::new_v4()).collect();
        let students: Vec<Uuid> = student_ids.iter().map(|s| s.0).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO student_check_ins (
                id, activity_id, student_id, attendance_status, checked_in_at, marked_absent_at
            )
            SELECT t.id, $1::uuid, t.student_id, $4::text, NULL, $5::timestamptz
            FROM UNNEST($2::uuid[], $3::uuid[]) AS t(id, student_id)
            ON CONFLICT (activity_id, student_id) DO NOTHING
            "#,
        )
        .bind(activity_id.0)
        .bind(ids)
        .bind(students)
        .bind(AttendanceStatus::Absent.as_str())
        .bind(marked_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() as usize)
    }
}
