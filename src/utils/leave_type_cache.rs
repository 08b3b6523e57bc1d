use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::Duration;

use crate::error::AppError;
use crate::model::leave_type::{LeaveType, LeaveTypeRow};

/// Leave types change rarely but are read on every leave decision.
static LEAVE_TYPE_CACHE: Lazy<Cache<u64, LeaveType>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(1_000)
        .time_to_live(Duration::from_secs(600))
        .build()
});

pub async fn get(pool: &MySqlPool, id: u64) -> Result<Option<LeaveType>, AppError> {
    if let Some(cached) = LEAVE_TYPE_CACHE.get(&id).await {
        return Ok(Some(cached));
    }

    let row = sqlx::query_as::<_, LeaveTypeRow>(
        "SELECT id, name, attendance_status, annual_allocation FROM leave_types WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let leave_type = LeaveType::try_from(row)?;
    LEAVE_TYPE_CACHE.insert(id, leave_type.clone()).await;
    Ok(Some(leave_type))
}

/// Fetches and fails with 404 when the leave type doesn't exist.
pub async fn require(pool: &MySqlPool, id: u64) -> Result<LeaveType, AppError> {
    get(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Leave type {id} not found")))
}

pub async fn remember(leave_type: &LeaveType) {
    LEAVE_TYPE_CACHE
        .insert(leave_type.id, leave_type.clone())
        .await;
}
