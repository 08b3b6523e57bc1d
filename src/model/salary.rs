use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
pub struct SalaryRecord {
    pub id: u64,
    pub user_email: String,
    pub year: i32,
    pub month: u32,
    pub per_day_rate: f64,
    pub present_days: f64,
    pub leave_days: f64,
    pub absent_days: f64,
    pub half_days: u32,
    pub earned: f64,
    pub deduction: f64,
    pub net_salary: f64,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}
