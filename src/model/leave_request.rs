use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::ledger::LedgerError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "user_email": "jane@company.com",
    "leave_type_id": 2,
    "start_date": "2026-03-05",
    "end_date": "2026-03-09",
    "total_days": 4,
    "status": "pending",
    "reason": "Family event",
    "decided_by": null,
    "created_at": "2026-03-01T08:00:00Z"
}))]
pub struct LeaveRequest {
    pub id: u64,
    pub user_email: String,
    pub leave_type_id: u64,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub total_days: u32,
    pub status: LeaveStatus,
    pub reason: Option<String>,
    pub decided_by: Option<String>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct LeaveRequestRow {
    pub id: u64,
    pub user_email: String,
    pub leave_type_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: u32,
    pub status: String,
    pub reason: Option<String>,
    pub decided_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl TryFrom<LeaveRequestRow> for LeaveRequest {
    type Error = LedgerError;

    fn try_from(row: LeaveRequestRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse()
            .map_err(|_| LedgerError::UnknownStatus(row.status.clone()))?;

        Ok(LeaveRequest {
            id: row.id,
            user_email: row.user_email,
            leave_type_id: row.leave_type_id,
            start_date: row.start_date,
            end_date: row.end_date,
            total_days: row.total_days,
            status,
            reason: row.reason,
            decided_by: row.decided_by,
            created_at: row.created_at,
        })
    }
}
