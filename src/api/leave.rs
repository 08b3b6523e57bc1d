use actix_web::{HttpResponse, web};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlConnection, MySqlPool, Transaction};
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

use crate::api::attendance::upsert_attendance;
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::{AppError, is_duplicate_key};
use crate::ledger::calendar::count_working_days;
use crate::ledger::leave_sync::{
    classify_leave_type, ensure_no_overlap, plan_leave_attendance, validate_leave_status,
};
use crate::model::attendance::AttendanceStatus;
use crate::model::leave_balance::LeaveBalance;
use crate::model::leave_request::{LeaveRequest, LeaveRequestRow, LeaveStatus};
use crate::model::leave_type::{LeaveType, LeaveTypeRow};
use crate::models::normalize_email;
use crate::utils::leave_type_cache;

const LEAVE_COLUMNS: &str = "id, user_email, leave_type_id, start_date, end_date, total_days, \
     status, reason, decided_by, created_at";

const BALANCE_COLUMNS: &str =
    "id, user_email, leave_type_id, year, total_allocated, used, pending, available";

#[derive(Deserialize, ToSchema)]
pub struct CreateLeaveType {
    #[schema(example = "Sick Leave")]
    pub name: String,
    /// Must be one of the leave statuses when given
    #[serde(default)]
    pub attendance_status: Option<AttendanceStatus>,
    #[schema(example = 12.0)]
    pub annual_allocation: f64,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = 2)]
    pub leave_type_id: u64,
    #[schema(example = "2026-03-05", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-03-09", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    /// Filter by user (HR/Admin only; employees always see their own)
    pub user_email: Option<String>,
    #[schema(example = "pending")]
    /// Filter by leave status
    pub status: Option<LeaveStatus>,
    #[schema(example = 1)]
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    #[schema(example = 10)]
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveRequest>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Deserialize, IntoParams)]
pub struct BalanceQuery {
    pub user_email: Option<String>,
    /// Defaults to the current year
    pub year: Option<i32>,
}

#[derive(Deserialize, ToSchema)]
pub struct AllocateBalance {
    #[schema(example = "jane@company.com")]
    pub user_email: String,
    #[schema(example = 2)]
    pub leave_type_id: u64,
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 14.0)]
    pub total_allocated: f64,
}

/// Locks the balance row for the rest of the transaction, creating it from
/// the leave type's annual allocation when it doesn't exist yet.
async fn lock_balance(
    conn: &mut MySqlConnection,
    user_email: &str,
    leave_type: &LeaveType,
    year: i32,
) -> Result<LeaveBalance, AppError> {
    let fresh = LeaveBalance::allocated(user_email, leave_type.id, year, leave_type.annual_allocation);

    sqlx::query(
        r#"
        INSERT IGNORE INTO leave_balances
            (user_email, leave_type_id, year, total_allocated, used, pending, available)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&fresh.user_email)
    .bind(fresh.leave_type_id)
    .bind(fresh.year)
    .bind(fresh.total_allocated)
    .bind(fresh.used)
    .bind(fresh.pending)
    .bind(fresh.available)
    .execute(&mut *conn)
    .await?;

    let balance = sqlx::query_as::<_, LeaveBalance>(&format!(
        "SELECT {BALANCE_COLUMNS} FROM leave_balances \
         WHERE user_email = ? AND leave_type_id = ? AND year = ? FOR UPDATE"
    ))
    .bind(user_email)
    .bind(leave_type.id)
    .bind(year)
    .fetch_one(&mut *conn)
    .await?;

    Ok(balance)
}

async fn store_balance(conn: &mut MySqlConnection, balance: &LeaveBalance) -> Result<(), AppError> {
    if !balance.is_consistent() {
        return Err(AppError::Internal(anyhow::anyhow!(
            "leave balance {} out of step: {balance:?}",
            balance.id
        )));
    }

    sqlx::query(
        r#"
        UPDATE leave_balances
        SET total_allocated = ?, used = ?, pending = ?, available = ?
        WHERE id = ?
        "#,
    )
    .bind(balance.total_allocated)
    .bind(balance.used)
    .bind(balance.pending)
    .bind(balance.available)
    .bind(balance.id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Leave type of a request, read outside any transaction.
async fn leave_type_of(pool: &MySqlPool, leave_id: u64) -> Result<LeaveType, AppError> {
    let request = fetch_leave(pool, leave_id).await?;
    leave_type_cache::require(pool, request.leave_type_id).await
}

/// Loads a pending request with its row locked.
async fn lock_pending_request(
    tx: &mut Transaction<'_, MySql>,
    leave_id: u64,
    leave_type: &LeaveType,
) -> Result<LeaveRequest, AppError> {
    let row = sqlx::query_as::<_, LeaveRequestRow>(&format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ? FOR UPDATE"
    ))
    .bind(leave_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Leave request not found".into()))?;

    let request = LeaveRequest::try_from(row)?;
    if request.status != LeaveStatus::Pending {
        return Err(AppError::BadRequest(format!(
            "Leave request already {}",
            request.status
        )));
    }
    if request.leave_type_id != leave_type.id {
        return Err(AppError::Conflict("Leave request changed, retry".into()));
    }
    Ok(request)
}

/// Locks the user's pending and approved requests that touch the range.
async fn lock_overlapping(
    tx: &mut Transaction<'_, MySql>,
    user_email: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<LeaveRequest>, AppError> {
    let rows = sqlx::query_as::<_, LeaveRequestRow>(&format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests \
         WHERE user_email = ? AND status IN (?, ?) AND start_date <= ? AND end_date >= ? \
         FOR UPDATE"
    ))
    .bind(user_email)
    .bind(LeaveStatus::Pending.as_ref())
    .bind(LeaveStatus::Approved.as_ref())
    .bind(end)
    .bind(start)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows
        .into_iter()
        .map(LeaveRequest::try_from)
        .collect::<Result<Vec<_>, _>>()?)
}

async fn set_status(
    tx: &mut Transaction<'_, MySql>,
    leave_id: u64,
    status: LeaveStatus,
    decided_by: &str,
) -> Result<(), AppError> {
    sqlx::query("UPDATE leave_requests SET status = ?, decided_by = ? WHERE id = ?")
        .bind(status.as_ref())
        .bind(decided_by)
        .bind(leave_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn fetch_leave(pool: &MySqlPool, leave_id: u64) -> Result<LeaveRequest, AppError> {
    let row = sqlx::query_as::<_, LeaveRequestRow>(&format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ?"
    ))
    .bind(leave_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Leave request not found".into()))?;

    Ok(LeaveRequest::try_from(row)?)
}

#[utoipa::path(
    get,
    path = "/api/leave-types",
    responses((status = 200, body = [LeaveType])),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn list_leave_types(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let rows = sqlx::query_as::<_, LeaveTypeRow>(
        "SELECT id, name, attendance_status, annual_allocation FROM leave_types ORDER BY name",
    )
    .fetch_all(pool.get_ref())
    .await?;

    let mut types = Vec::with_capacity(rows.len());
    for row in rows {
        let leave_type = LeaveType::try_from(row)?;
        leave_type_cache::remember(&leave_type).await;
        types.push(leave_type);
    }

    Ok(HttpResponse::Ok().json(types))
}

#[utoipa::path(
    post,
    path = "/api/leave-types",
    request_body = CreateLeaveType,
    responses(
        (status = 201, body = LeaveType),
        (status = 400, description = "Invalid name, allocation or status"),
        (status = 409, description = "Leave type already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave_type(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeaveType>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required".into()));
    }
    if !payload.annual_allocation.is_finite() || payload.annual_allocation < 0.0 {
        return Err(AppError::BadRequest(
            "annual_allocation must be zero or more".into(),
        ));
    }
    let attendance_status = payload
        .attendance_status
        .map(validate_leave_status)
        .transpose()?;

    let result = sqlx::query(
        "INSERT INTO leave_types (name, attendance_status, annual_allocation) VALUES (?, ?, ?)",
    )
    .bind(name)
    .bind(attendance_status.map(|s| s.to_string()))
    .bind(payload.annual_allocation)
    .execute(pool.get_ref())
    .await;

    let result = match result {
        Ok(r) => r,
        Err(e) if is_duplicate_key(&e) => {
            return Err(AppError::Conflict(format!("Leave type '{name}' already exists")));
        }
        Err(e) => return Err(e.into()),
    };

    let leave_type = LeaveType {
        id: result.last_insert_id(),
        name: name.to_string(),
        attendance_status,
        annual_allocation: payload.annual_allocation,
    };
    leave_type_cache::remember(&leave_type).await;
    info!(by = %auth.email, leave_type = %leave_type.name, "Leave type created");

    Ok(HttpResponse::Created().json(leave_type))
}

/// Submit a leave request. The working days it covers are held as
/// pending on the balance of the start date's year.
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body = CreateLeave,
    responses(
        (status = 201, description = "Leave request submitted", body = LeaveRequest),
        (status = 400, description = "Invalid range or no working days"),
        (status = 404, description = "Unknown leave type"),
        (status = 409, description = "Insufficient balance or overlapping request")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreateLeave>,
) -> Result<HttpResponse, AppError> {
    let email = normalize_email(&auth.email);
    let leave_type = leave_type_cache::require(pool.get_ref(), payload.leave_type_id).await?;

    let total_days = count_working_days(
        payload.start_date,
        payload.end_date,
        config.schedule.weekly_off,
    )?;
    if total_days == 0 {
        return Err(AppError::BadRequest(
            "Leave range contains no working days".into(),
        ));
    }

    let mut tx = pool.begin().await?;

    let existing = lock_overlapping(&mut tx, &email, payload.start_date, payload.end_date).await?;
    ensure_no_overlap(&existing, payload.start_date, payload.end_date)?;

    let mut balance =
        lock_balance(&mut tx, &email, &leave_type, payload.start_date.year()).await?;
    balance.reserve(total_days as f64)?;
    store_balance(&mut tx, &balance).await?;

    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (user_email, leave_type_id, start_date, end_date, total_days, status, reason)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&email)
    .bind(leave_type.id)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(total_days)
    .bind(LeaveStatus::Pending.as_ref())
    .bind(payload.reason.as_deref())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(user = %email, leave_type = %leave_type.name, total_days, "Leave request submitted");

    let request = fetch_leave(pool.get_ref(), result.last_insert_id()).await?;
    Ok(HttpResponse::Created().json(request))
}

/// Approves a pending request, moves its days from pending to used and
/// writes one attendance record per working day. Any failure rolls the
/// whole approval back.
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(("leave_id" = u64, Path, description = "ID of the leave request to approve")),
    responses(
        (status = 200, description = "Leave approved", body = LeaveRequest),
        (status = 400, description = "Leave request already processed"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
#[instrument(name = "approve_leave", skip(auth, pool, config, path), fields(by = %auth.email))]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let leave_id = path.into_inner();

    // Resolved before the transaction so a cache miss never waits on a
    // second pool connection while this one holds row locks.
    let leave_type = leave_type_of(pool.get_ref(), leave_id).await?;

    let mut tx = pool.begin().await?;
    let request = lock_pending_request(&mut tx, leave_id, &leave_type).await?;

    let mut balance = lock_balance(
        &mut tx,
        &request.user_email,
        &leave_type,
        request.start_date.year(),
    )
    .await?;
    balance.approve(request.total_days as f64)?;
    store_balance(&mut tx, &balance).await?;

    set_status(&mut tx, leave_id, LeaveStatus::Approved, &auth.email).await?;

    let status = classify_leave_type(&leave_type);
    let plan = plan_leave_attendance(&request, status, config.schedule.weekly_off)?;
    for row in &plan {
        upsert_attendance(&mut *tx, row).await?;
    }

    tx.commit().await?;

    info!(leave_id, user = %request.user_email, days = plan.len(), status = %status, "Leave approved");

    let request = fetch_leave(pool.get_ref(), leave_id).await?;
    Ok(HttpResponse::Ok().json(request))
}

#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(("leave_id" = u64, Path, description = "ID of the leave request to reject")),
    responses(
        (status = 200, description = "Leave rejected", body = LeaveRequest),
        (status = 400, description = "Leave request already processed"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
#[instrument(name = "reject_leave", skip(auth, pool, path), fields(by = %auth.email))]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let leave_id = path.into_inner();

    let leave_type = leave_type_of(pool.get_ref(), leave_id).await?;

    let mut tx = pool.begin().await?;
    let request = lock_pending_request(&mut tx, leave_id, &leave_type).await?;

    let mut balance = lock_balance(
        &mut tx,
        &request.user_email,
        &leave_type,
        request.start_date.year(),
    )
    .await?;
    balance.release(request.total_days as f64)?;
    store_balance(&mut tx, &balance).await?;

    set_status(&mut tx, leave_id, LeaveStatus::Rejected, &auth.email).await?;
    tx.commit().await?;

    info!(leave_id, user = %request.user_email, "Leave rejected");

    let request = fetch_leave(pool.get_ref(), leave_id).await?;
    Ok(HttpResponse::Ok().json(request))
}

#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "ID of the leave request to fetch")),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRequest),
        (status = 403, description = "Another user's request"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let request = fetch_leave(pool.get_ref(), path.into_inner()).await?;
    auth.require_self_or_hr(&request.user_email)?;

    Ok(HttpResponse::Ok().json(request))
}

#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses((status = 200, description = "Paginated leave list", body = LeaveListResponse)),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> Result<HttpResponse, AppError> {
    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    let user_email = if auth.is_hr_or_admin() {
        query.user_email.as_deref().map(normalize_email)
    } else {
        Some(normalize_email(&auth.email))
    };

    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<&str> = Vec::new();

    if let Some(email) = user_email.as_deref() {
        where_sql.push_str(" AND user_email = ?");
        args.push(email);
    }

    if let Some(status) = query.status.as_ref() {
        where_sql.push_str(" AND status = ?");
        args.push(status.as_ref());
    }

    let count_sql = format!("SELECT COUNT(*) FROM leave_requests{where_sql}");
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = count_q.bind(*arg);
    }
    let total = count_q.fetch_one(pool.get_ref()).await?;

    let data_sql = format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests{where_sql} \
         ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
    );
    let mut data_q = sqlx::query_as::<_, LeaveRequestRow>(&data_sql);
    for arg in args {
        data_q = data_q.bind(arg);
    }

    let rows = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    let data = rows
        .into_iter()
        .map(LeaveRequest::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/leave/balances",
    params(BalanceQuery),
    responses((status = 200, body = [LeaveBalance])),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn list_balances(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<BalanceQuery>,
) -> Result<HttpResponse, AppError> {
    let email = normalize_email(query.user_email.as_deref().unwrap_or(&auth.email));
    auth.require_self_or_hr(&email)?;

    let year = query
        .year
        .unwrap_or_else(|| config.schedule.local(Utc::now()).0.year());

    let balances = sqlx::query_as::<_, LeaveBalance>(&format!(
        "SELECT {BALANCE_COLUMNS} FROM leave_balances \
         WHERE user_email = ? AND year = ? ORDER BY leave_type_id"
    ))
    .bind(&email)
    .bind(year)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(balances))
}

/// Sets a user's allocation for a leave type and year. Fails when the new
/// total is below what is already used or pending.
#[utoipa::path(
    post,
    path = "/api/leave/balances",
    request_body = AllocateBalance,
    responses(
        (status = 200, body = LeaveBalance),
        (status = 409, description = "Allocation below committed days")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn allocate_balance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<AllocateBalance>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;

    let email = normalize_email(&payload.user_email);
    if email.is_empty() {
        return Err(AppError::BadRequest("user_email is required".into()));
    }
    let leave_type = leave_type_cache::require(pool.get_ref(), payload.leave_type_id).await?;

    let mut tx = pool.begin().await?;
    let mut balance = lock_balance(&mut tx, &email, &leave_type, payload.year).await?;
    balance.set_allocation(payload.total_allocated)?;
    store_balance(&mut tx, &balance).await?;
    tx.commit().await?;

    info!(
        by = %auth.email,
        user = %email,
        leave_type = %leave_type.name,
        year = payload.year,
        total = balance.total_allocated,
        "Leave allocation set"
    );

    Ok(HttpResponse::Ok().json(balance))
}
