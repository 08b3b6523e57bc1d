use serde::Serialize;
use utoipa::ToSchema;

/// Per-user, per-leave-type, per-year counters.
///
/// `available` is never written directly; every mutation in
/// `ledger::balance` recomputes it from the other three counters.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema, sqlx::FromRow)]
#[schema(example = json!({
    "id": 4,
    "user_email": "jane@company.com",
    "leave_type_id": 2,
    "year": 2026,
    "total_allocated": 12.0,
    "used": 3.0,
    "pending": 2.0,
    "available": 7.0
}))]
pub struct LeaveBalance {
    pub id: u64,
    pub user_email: String,
    pub leave_type_id: u64,
    pub year: i32,
    pub total_allocated: f64,
    pub used: f64,
    pub pending: f64,
    pub available: f64,
}
