use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

use crate::ledger::LedgerError;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    ToSchema,
    EnumString,
    Display,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    HalfDay,
    Leave,
    WorkFromHome,
    SickLeave,
    CasualLeave,
    Weekoff,
    Holiday,
}

impl AttendanceStatus {
    /// Any of the statuses written by an approved leave request.
    pub fn is_leave(self) -> bool {
        matches!(
            self,
            AttendanceStatus::Leave | AttendanceStatus::SickLeave | AttendanceStatus::CasualLeave
        )
    }

    /// Days of pay this status adds to the month's net salary. An absence
    /// is deducted at the full rate.
    pub fn salary_weight(self) -> f64 {
        match self {
            AttendanceStatus::Absent => -1.0,
            AttendanceStatus::HalfDay => 0.5,
            _ => 1.0,
        }
    }

    pub fn parse(value: &str) -> Result<Self, LedgerError> {
        value
            .parse()
            .map_err(|_| LedgerError::UnknownStatus(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": 12,
    "user_email": "jane@company.com",
    "date": "2026-03-02",
    "status": "present",
    "check_in_time": "09:05:00",
    "check_out_time": "18:01:00",
    "total_hours": 8.93,
    "is_late": false,
    "is_early_checkout": false,
    "location": "HQ",
    "remarks": null
}))]
pub struct AttendanceRecord {
    pub id: u64,
    pub user_email: String,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[schema(value_type = Option<String>, example = "09:05:00")]
    pub check_in_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "18:01:00")]
    pub check_out_time: Option<NaiveTime>,
    pub total_hours: Option<f64>,
    pub is_late: bool,
    pub is_early_checkout: bool,
    pub location: Option<String>,
    pub remarks: Option<String>,
}

/// Raw `attendance` row; the status column is stored as snake_case text.
#[derive(Debug, sqlx::FromRow)]
pub struct AttendanceRow {
    pub id: u64,
    pub user_email: String,
    pub date: NaiveDate,
    pub status: String,
    pub check_in_time: Option<NaiveTime>,
    pub check_out_time: Option<NaiveTime>,
    pub total_hours: Option<f64>,
    pub is_late: bool,
    pub is_early_checkout: bool,
    pub location: Option<String>,
    pub remarks: Option<String>,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = LedgerError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        Ok(AttendanceRecord {
            id: row.id,
            status: AttendanceStatus::parse(&row.status)?,
            user_email: row.user_email,
            date: row.date,
            check_in_time: row.check_in_time,
            check_out_time: row.check_out_time,
            total_hours: row.total_hours,
            is_late: row.is_late,
            is_early_checkout: row.is_early_checkout,
            location: row.location,
            remarks: row.remarks,
        })
    }
}

/// Everything needed to write the single record kept for a user and day.
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema)]
pub struct AttendanceUpsert {
    #[schema(example = "jane@company.com")]
    pub user_email: String,
    #[schema(value_type = String, format = "date", example = "2026-03-02")]
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "09:05:00")]
    pub check_in_time: Option<NaiveTime>,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "18:01:00")]
    pub check_out_time: Option<NaiveTime>,
    #[serde(default)]
    pub total_hours: Option<f64>,
    #[serde(default)]
    pub is_late: bool,
    #[serde(default)]
    pub is_early_checkout: bool,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl AttendanceUpsert {
    pub fn status_only(user_email: impl Into<String>, date: NaiveDate, status: AttendanceStatus) -> Self {
        Self {
            user_email: user_email.into(),
            date,
            status,
            check_in_time: None,
            check_out_time: None,
            total_hours: None,
            is_late: false,
            is_early_checkout: false,
            location: None,
            remarks: None,
        }
    }
}
