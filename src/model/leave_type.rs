use serde::Serialize;
use utoipa::ToSchema;

use crate::ledger::LedgerError;
use crate::model::attendance::AttendanceStatus;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 2,
    "name": "Sick Leave",
    "attendance_status": "sick_leave",
    "annual_allocation": 12.0
}))]
pub struct LeaveType {
    pub id: u64,
    pub name: String,
    /// Explicit status written to attendance on approval. When empty the
    /// status is derived from the name.
    pub attendance_status: Option<AttendanceStatus>,
    pub annual_allocation: f64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct LeaveTypeRow {
    pub id: u64,
    pub name: String,
    pub attendance_status: Option<String>,
    pub annual_allocation: f64,
}

impl TryFrom<LeaveTypeRow> for LeaveType {
    type Error = LedgerError;

    fn try_from(row: LeaveTypeRow) -> Result<Self, Self::Error> {
        let attendance_status = row
            .attendance_status
            .as_deref()
            .map(AttendanceStatus::parse)
            .transpose()?;

        Ok(LeaveType {
            id: row.id,
            name: row.name,
            attendance_status,
            annual_allocation: row.annual_allocation,
        })
    }
}
