// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Check-in Codes and Attendance Records
//!
//! - [`CheckInCode`]: the 6-character code students type on site
//! - [`DailyCheckInCode`]: one code per (activity, calendar date), never mutated
//! - [`StudentCheckIn`]: one attendance record per (activity, student)

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::activity::ActivityId;
use crate::domain::actor::UserId;
use crate::domain::error::CoordinatorError;

pub const CODE_LETTERS: usize = 2;
pub const CODE_DIGITS: usize = 4;

// ============================================================================
// Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckInId(pub Uuid);

impl CheckInId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CheckInId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CheckInId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Two uppercase letters followed by four digits, e.g. `AB1234`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CheckInCode(String);

impl CheckInCode {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut code = String::with_capacity(CODE_LETTERS + CODE_DIGITS);
        for _ in 0..CODE_LETTERS {
            code.push(char::from(rng.random_range(b'A'..=b'Z')));
        }
        for _ in 0..CODE_DIGITS {
            code.push(char::from(rng.random_range(b'0'..=b'9')));
        }
        Self(code)
    }

    /// Parse a stored or configured code, normalizing to uppercase.
    pub fn parse(raw: &str) -> Result<Self, CoordinatorError> {
        let code = raw.trim().to_ascii_uppercase();
        let bytes = code.as_bytes();
        let well_formed = bytes.len() == CODE_LETTERS + CODE_DIGITS
            && bytes[..CODE_LETTERS].iter().all(u8::is_ascii_uppercase)
            && bytes[CODE_LETTERS..].iter().all(u8::is_ascii_digit);

        if !well_formed {
            return Err(CoordinatorError::validation(format!(
                "check-in code must be {} letters followed by {} digits",
                CODE_LETTERS, CODE_DIGITS
            )));
        }
        Ok(Self(code))
    }

    /// Trimmed, case-insensitive comparison against a submitted code
    pub fn matches(&self, submitted: &str) -> bool {
        submitted.trim().eq_ignore_ascii_case(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CheckInCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CheckInCode {
    type Error = CoordinatorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CheckInCode> for String {
    fn from(code: CheckInCode) -> Self {
        code.0
    }
}

/// Source of fresh codes
pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> CheckInCode;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> CheckInCode {
        CheckInCode::generate(&mut rand::rng())
    }
}

// ============================================================================
// Entities
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCheckInCode {
    pub id: Uuid,
    pub activity_id: ActivityId,
    pub code: CheckInCode,
    pub valid_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl DailyCheckInCode {
    pub fn new(
        activity_id: ActivityId,
        code: CheckInCode,
        valid_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            activity_id,
            code,
            valid_date,
            created_at: now,
        }
    }

    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.valid_date == date
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
        }
    }
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            other => Err(format!("unknown attendance status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentCheckIn {
    pub id: CheckInId,
    pub activity_id: ActivityId,
    pub student_id: UserId,
    pub attendance_status: AttendanceStatus,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub marked_absent_at: Option<DateTime<Utc>>,
}

impl StudentCheckIn {
    pub fn present(activity_id: ActivityId, student_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: CheckInId::new(),
            activity_id,
            student_id,
            attendance_status: AttendanceStatus::Present,
            checked_in_at: Some(now),
            marked_absent_at: None,
        }
    }

    pub fn absent(activity_id: ActivityId, student_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: CheckInId::new(),
            activity_id,
            student_id,
            attendance_status: AttendanceStatus::Absent,
            checked_in_at: None,
            marked_absent_at: Some(now),
        }
    }

    pub fn is_present(&self) -> bool {
        self.attendance_status == AttendanceStatus::Present
    }

    /// Upgrade to present. Present records are never downgraded.
    pub fn mark_present(&mut self, now: DateTime<Utc>) {
        self.attendance_status = AttendanceStatus::Present;
        self.checked_in_at = Some(now);
        self.marked_absent_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_code_shape() {
        let mut rng = rand::rng();
        for _ in 0..100 {
            let code = CheckInCode::generate(&mut rng);
            let s = code.as_str();
            assert_eq!(s.len(), 6);
            assert!(s[..2].chars().all(|c| c.is_ascii_uppercase()));
            assert!(s[2..].chars().all(|c| c.is_ascii_digit()));
            assert!(CheckInCode::parse(s).is_ok());
        }
    }

    #[test]
    fn test_parse_normalizes_case() {
        let code = CheckInCode::parse(" ab1234 ").unwrap();
        assert_eq!(code.as_str(), "AB1234");
        assert!(CheckInCode::parse("A12345").is_err());
        assert!(CheckInCode::parse("ABC123").is_err());
        assert!(CheckInCode::parse("AB123").is_err());
    }

    #[test]
    fn test_match_is_trimmed_and_case_insensitive() {
        let code = CheckInCode::parse("AB1234").unwrap();
        assert!(code.matches("ab1234"));
        assert!(code.matches("  Ab1234\n"));
        assert!(!code.matches("AB1235"));
        assert!(!code.matches(""));
    }

    #[test]
    fn test_code_valid_only_on_its_date() {
        let today = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let code = DailyCheckInCode::new(
            ActivityId::new(),
            CheckInCode::parse("AB1234").unwrap(),
            today,
            Utc::now(),
        );
        assert!(code.is_valid_on(today));
        assert!(!code.is_valid_on(today.succ_opt().unwrap()));
    }

    #[test]
    fn test_absent_record_upgrades_to_present() {
        let mut record = StudentCheckIn::absent(ActivityId::new(), UserId::new(), Utc::now());
        assert!(!record.is_present());
        record.mark_present(Utc::now());
        assert!(record.is_present());
        assert!(record.checked_in_at.is_some());
        assert!(record.marked_absent_at.is_none());
    }

    #[test]
    fn test_code_serializes_as_string() {
        let code = CheckInCode::parse("XY0042").unwrap();
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"XY0042\"");
        let bad: Result<CheckInCode, _> = serde_json::from_str("\"nope\"");
        assert!(bad.is_err());
    }
}
