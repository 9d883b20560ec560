use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::{AppError, FieldErrors};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum AttendanceStatus {
    Present,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "id": "0b6c1f0e-7c55-4d1c-8f54-5b8f3f3f1a20",
        "employee_id": "EMP-001",
        "date": "2026-01-01",
        "status": "Present",
        "created_at": "2026-01-01T09:00:00Z"
    })
)]
pub struct Attendance {
    pub id: String,
    /// References `Employee::employee_id`, not the opaque id.
    pub employee_id: String,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

/// Raw mark-attendance request. Fields stay strings, and absent ones default
/// to empty, so that bad or missing values are reported as field errors
/// rather than payload errors.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(default)]
pub struct MarkAttendance {
    #[schema(example = "EMP-001", value_type = String)]
    pub employee_id: String,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub date: String,
    #[schema(example = "Present", value_type = String)]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAttendance {
    pub employee_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

impl MarkAttendance {
    pub fn validate(&self) -> Result<NewAttendance, AppError> {
        let mut errors = FieldErrors::new();

        let employee_id = self.employee_id.trim().to_string();
        if employee_id.is_empty() {
            errors.add("employee_id", "Please select an employee");
        }

        let date = self.date.trim();
        let date = if date.is_empty() {
            errors.add("date", "Please select a date");
            None
        } else {
            let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok();
            if parsed.is_none() {
                errors.add("date", "Date must be a valid calendar date (YYYY-MM-DD)");
            }
            parsed
        };

        let status = self.status.trim();
        let status = if status.is_empty() {
            errors.add("status", "Please select a status");
            None
        } else {
            let parsed = status.parse::<AttendanceStatus>().ok();
            if parsed.is_none() {
                errors.add("status", "Status must be Present or Absent");
            }
            parsed
        };

        match (date, status) {
            (Some(date), Some(status)) => errors.into_result(NewAttendance {
                employee_id,
                date,
                status,
            }),
            _ => Err(AppError::Validation(errors)),
        }
    }
}

/// Case-insensitive substring match on the employee code.
pub fn matches_search(record: &Attendance, needle: &str) -> bool {
    record
        .employee_id
        .to_lowercase()
        .contains(&needle.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(status: &str, date: &str) -> MarkAttendance {
        MarkAttendance {
            employee_id: "EMP-001".into(),
            date: date.into(),
            status: status.into(),
        }
    }

    #[test]
    fn accepts_both_statuses() {
        let present = input("Present", "2026-10-16").validate().unwrap();
        assert_eq!(present.status, AttendanceStatus::Present);
        assert_eq!(present.date, NaiveDate::from_ymd_opt(2026, 10, 16).unwrap());

        let absent = input("Absent", "2026-10-16").validate().unwrap();
        assert_eq!(absent.status, AttendanceStatus::Absent);
    }

    #[test]
    fn rejects_unknown_status() {
        let AppError::Validation(errors) = input("Late", "2026-10-16").validate().unwrap_err()
        else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("status"), Some("Status must be Present or Absent"));
        assert!(input("present", "2026-10-16").validate().is_err());
    }

    #[test]
    fn rejects_impossible_dates() {
        assert!(input("Present", "2026-02-30").validate().is_err());
        assert!(input("Present", "16/10/2026").validate().is_err());
    }

    #[test]
    fn blank_fields_ask_for_a_selection() {
        let AppError::Validation(errors) = input(" ", "").validate().unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("date"), Some("Please select a date"));
        assert_eq!(errors.get("status"), Some("Please select a status"));
    }

    #[test]
    fn absent_fields_deserialize_as_blank() {
        let body: MarkAttendance =
            serde_json::from_value(serde_json::json!({ "employee_id": "EMP-001" })).unwrap();
        assert_eq!(body.date, "");
        assert_eq!(body.status, "");
    }

    #[test]
    fn requires_employee() {
        let mut missing = input("Present", "2026-10-16");
        missing.employee_id = "  ".into();
        let AppError::Validation(errors) = missing.validate().unwrap_err() else {
            panic!("expected validation error");
        };
        assert!(errors.get("employee_id").is_some());
    }

    #[test]
    fn status_serializes_as_pascal_case() {
        assert_eq!(
            serde_json::to_value(AttendanceStatus::Present).unwrap(),
            serde_json::json!("Present")
        );
        assert_eq!(AttendanceStatus::Absent.to_string(), "Absent");
    }
}
