use std::collections::HashSet;

use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::AppError;
use crate::ledger::aggregate::{AttendanceSummary, summarize};
use crate::ledger::calendar::MonthPeriod;
use crate::ledger::lateness::{WorkSchedule, worked_hours};
use crate::model::attendance::{AttendanceRecord, AttendanceRow, AttendanceStatus, AttendanceUpsert};
use crate::models::normalize_email;
use crate::utils::db_utils::{build_update_sql, execute_update};

/// Rows per multi-row INSERT during bulk import.
pub const IMPORT_CHUNK_SIZE: usize = 100;

const ATTENDANCE_COLUMNS: &str = "id, user_email, date, status, check_in_time, check_out_time, \
     total_hours, is_late, is_early_checkout, location, remarks";

#[derive(Deserialize, IntoParams)]
pub struct AttendanceQuery {
    /// Defaults to the caller
    pub user_email: Option<String>,
    pub year: i32,
    pub month: u32,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceSummaryResponse {
    pub year: i32,
    pub month: u32,
    pub days_in_period: u32,
    pub summaries: Vec<AttendanceSummary>,
}

#[derive(Deserialize, ToSchema)]
pub struct BulkImportRequest {
    pub rows: Vec<AttendanceUpsert>,
}

#[derive(Debug, PartialEq, Serialize, ToSchema)]
pub struct RejectedRow {
    /// Position in the submitted `rows`
    pub index: usize,
    #[schema(example = "user_email is required")]
    pub reason: String,
}

#[derive(Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct ImportReport {
    pub received: usize,
    pub inserted: u64,
    pub duplicates_in_payload: usize,
    pub already_recorded: usize,
    pub rejected: Vec<RejectedRow>,
}

/// Writes the one record kept per user and day, replacing whatever was
/// there.
pub async fn upsert_attendance<'c, E>(executor: E, row: &AttendanceUpsert) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'c, Database = MySql>,
{
    sqlx::query(
        r#"
        INSERT INTO attendance
            (user_email, date, status, check_in_time, check_out_time, total_hours,
             is_late, is_early_checkout, location, remarks)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            status = VALUES(status),
            check_in_time = VALUES(check_in_time),
            check_out_time = VALUES(check_out_time),
            total_hours = VALUES(total_hours),
            is_late = VALUES(is_late),
            is_early_checkout = VALUES(is_early_checkout),
            location = VALUES(location),
            remarks = VALUES(remarks)
        "#,
    )
    .bind(&row.user_email)
    .bind(row.date)
    .bind(row.status.as_ref())
    .bind(row.check_in_time)
    .bind(row.check_out_time)
    .bind(row.total_hours)
    .bind(row.is_late)
    .bind(row.is_early_checkout)
    .bind(row.location.as_deref())
    .bind(row.remarks.as_deref())
    .execute(executor)
    .await?;

    Ok(())
}

async fn find_for_day(
    pool: &MySqlPool,
    user_email: &str,
    date: NaiveDate,
) -> Result<Option<AttendanceRecord>, AppError> {
    let row = sqlx::query_as::<_, AttendanceRow>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE user_email = ? AND date = ?"
    ))
    .bind(user_email)
    .bind(date)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(AttendanceRecord::try_from).transpose()?)
}

/// Records of one user (or everyone) inside a month, ordered by day.
pub async fn fetch_month_records(
    pool: &MySqlPool,
    user_email: Option<&str>,
    period: &MonthPeriod,
) -> Result<Vec<AttendanceRecord>, AppError> {
    let mut qb = QueryBuilder::<MySql>::new(format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE date BETWEEN "
    ));
    qb.push_bind(period.first())
        .push(" AND ")
        .push_bind(period.last());

    if let Some(email) = user_email {
        qb.push(" AND user_email = ").push_bind(email);
    }
    qb.push(" ORDER BY user_email, date, id");

    let rows = qb
        .build_query_as::<AttendanceRow>()
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(AttendanceRecord::try_from)
        .collect::<Result<_, _>>()?)
}

/// Fills in lateness, early checkout and hours from the schedule.
pub fn apply_schedule(mut row: AttendanceUpsert, schedule: &WorkSchedule) -> AttendanceUpsert {
    row.is_late = row.check_in_time.is_some_and(|t| schedule.is_late(t));
    row.is_early_checkout = row.check_out_time.is_some_and(|t| schedule.is_early_checkout(t));
    if let (Some(check_in), Some(check_out)) = (row.check_in_time, row.check_out_time) {
        row.total_hours = worked_hours(check_in, check_out);
    }
    row
}

/// Checks a row whose email is already normalized. Shared by single marks
/// and bulk import.
pub fn validate_row(row: &AttendanceUpsert) -> Result<(), String> {
    if row.user_email.is_empty() {
        return Err("user_email is required".into());
    }
    if let (Some(check_in), Some(check_out)) = (row.check_in_time, row.check_out_time) {
        if check_out < check_in {
            return Err("check_out_time cannot be before check_in_time".into());
        }
    }
    Ok(())
}

/// Splits import rows into the ones to insert and counts the skipped ones.
/// The first occurrence of a user/day in the payload wins.
pub fn plan_import(
    rows: Vec<AttendanceUpsert>,
    existing: &HashSet<(String, NaiveDate)>,
) -> (Vec<AttendanceUpsert>, ImportReport) {
    let mut report = ImportReport {
        received: rows.len(),
        ..Default::default()
    };
    let mut seen = HashSet::new();
    let mut accepted = Vec::new();

    for (index, mut row) in rows.into_iter().enumerate() {
        row.user_email = normalize_email(&row.user_email);
        if let Err(reason) = validate_row(&row) {
            report.rejected.push(RejectedRow { index, reason });
            continue;
        }
        let key = (row.user_email.clone(), row.date);

        if !seen.insert(key.clone()) {
            report.duplicates_in_payload += 1;
        } else if existing.contains(&key) {
            report.already_recorded += 1;
        } else {
            accepted.push(row);
        }
    }

    (accepted, report)
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    responses(
        (status = 200, description = "Checked in", body = AttendanceRecord),
        (status = 400, description = "Already checked in today"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let schedule = &config.schedule;
    let (today, now) = schedule.local(Utc::now());
    let email = normalize_email(&auth.email);

    if let Some(existing) = find_for_day(pool.get_ref(), &email, today).await? {
        if existing.check_in_time.is_some() {
            return Err(AppError::BadRequest("Already checked in today".into()));
        }
    }

    let row = AttendanceUpsert {
        check_in_time: Some(now),
        ..AttendanceUpsert::status_only(email.clone(), today, AttendanceStatus::Present)
    };
    let row = apply_schedule(row, schedule);

    upsert_attendance(pool.get_ref(), &row).await?;
    info!(user = %email, date = %today, is_late = row.is_late, "Checked in");

    let record = find_for_day(pool.get_ref(), &email, today)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("check-in row vanished")))?;

    Ok(HttpResponse::Ok().json(record))
}

/// Check-out endpoint
#[utoipa::path(
    put,
    path = "/api/attendance/check-out",
    responses(
        (status = 200, description = "Checked out", body = AttendanceRecord),
        (status = 400, description = "No active check-in found for today"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let schedule = &config.schedule;
    let (today, now) = schedule.local(Utc::now());
    let email = normalize_email(&auth.email);

    let open = find_for_day(pool.get_ref(), &email, today)
        .await?
        .filter(|r| r.check_out_time.is_none())
        .and_then(|r| r.check_in_time.map(|check_in| (r.id, check_in)));

    let Some((id, check_in)) = open else {
        return Err(AppError::BadRequest(
            "No active check-in found for today".into(),
        ));
    };

    let total_hours = worked_hours(check_in, now);
    let is_early = schedule.is_early_checkout(now);

    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET check_out_time = ?, total_hours = ?, is_early_checkout = ?
        WHERE id = ?
        AND check_out_time IS NULL
        "#,
    )
    .bind(now)
    .bind(total_hours)
    .bind(is_early)
    .bind(id)
    .execute(pool.get_ref())
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::BadRequest(
            "No active check-in found for today".into(),
        ));
    }

    info!(user = %email, date = %today, is_early, "Checked out");

    let record = find_for_day(pool.get_ref(), &email, today)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("check-out row vanished")))?;

    Ok(HttpResponse::Ok().json(record))
}

/// Manually mark a user's day (HR/Admin)
#[utoipa::path(
    post,
    path = "/api/attendance/mark",
    request_body = AttendanceUpsert,
    responses(
        (status = 200, description = "Attendance saved", body = AttendanceRecord),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn mark_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<AttendanceUpsert>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;

    let mut row = payload.into_inner();
    row.user_email = normalize_email(&row.user_email);
    validate_row(&row).map_err(AppError::BadRequest)?;

    let row = apply_schedule(row, &config.schedule);
    upsert_attendance(pool.get_ref(), &row).await?;
    info!(by = %auth.email, user = %row.user_email, date = %row.date, status = %row.status, "Attendance marked");

    let record = find_for_day(pool.get_ref(), &row.user_email, row.date)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("marked row vanished")))?;

    Ok(HttpResponse::Ok().json(record))
}

/// Partial update of status, location or remarks (HR/Admin)
#[utoipa::path(
    put,
    path = "/api/attendance/{attendance_id}",
    params(("attendance_id" = u64, Path, description = "Attendance record ID")),
    request_body(content = Object, example = json!({"status": "work_from_home", "remarks": "approved remotely"})),
    responses(
        (status = 200, description = "Attendance updated"),
        (status = 400, description = "Unknown field or invalid status"),
        (status = 404, description = "Attendance record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn update_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<serde_json::Value>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let attendance_id = path.into_inner();

    if payload.get("status").is_some_and(|v| v.is_null()) {
        return Err(AppError::BadRequest("status cannot be null".into()));
    }

    let update = build_update_sql(
        "attendance",
        &payload,
        &["status", "location", "remarks"],
        "id",
        attendance_id,
        |column, value| match column {
            "status" => AttendanceStatus::parse(value)
                .map(|_| ())
                .map_err(|e| AppError::BadRequest(e.to_string())),
            _ => Ok(()),
        },
    )?;

    let affected = execute_update(pool.get_ref(), update).await?;
    if affected == 0 {
        return Err(AppError::NotFound("Attendance record not found".into()));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Attendance updated"
    })))
}

/// List a user's attendance for a month
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, body = [AttendanceRecord]),
        (status = 403, description = "Employees can only list their own records")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> Result<HttpResponse, AppError> {
    let email = normalize_email(query.user_email.as_deref().unwrap_or(&auth.email));
    auth.require_self_or_hr(&email)?;

    let period = MonthPeriod::new(query.year, query.month)?;
    let records = fetch_month_records(pool.get_ref(), Some(&email), &period).await?;

    Ok(HttpResponse::Ok().json(records))
}

/// Monthly attendance summary. HR/Admin get every active user unless
/// `user_email` narrows it down; employees always get themselves.
#[utoipa::path(
    get,
    path = "/api/attendance/summary",
    params(AttendanceQuery),
    responses((status = 200, body = AttendanceSummaryResponse)),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn attendance_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> Result<HttpResponse, AppError> {
    let period = MonthPeriod::new(query.year, query.month)?;

    let only = match query.user_email.as_deref() {
        Some(email) => Some(normalize_email(email)),
        None if auth.is_hr_or_admin() => None,
        None => Some(normalize_email(&auth.email)),
    };
    if let Some(email) = &only {
        auth.require_self_or_hr(email)?;
    }

    let users: Vec<String> = match &only {
        Some(email) => vec![email.clone()],
        None => sqlx::query_scalar::<_, String>(
            "SELECT email FROM users WHERE is_active = TRUE ORDER BY email",
        )
        .fetch_all(pool.get_ref())
        .await?,
    };

    let records = fetch_month_records(pool.get_ref(), only.as_deref(), &period).await?;

    Ok(HttpResponse::Ok().json(AttendanceSummaryResponse {
        year: period.year,
        month: period.month,
        days_in_period: period.days(),
        summaries: summarize(&records, &users, &period),
    }))
}

/// Bulk import of attendance rows (HR/Admin). Rows already recorded for
/// the same user and day are skipped, never overwritten. Invalid rows are
/// listed in `rejected` and the rest still go in.
#[utoipa::path(
    post,
    path = "/api/attendance/import",
    request_body = BulkImportRequest,
    responses(
        (status = 200, body = ImportReport),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn import_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<BulkImportRequest>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let rows = payload.into_inner().rows;

    if rows.is_empty() {
        return Ok(HttpResponse::Ok().json(ImportReport::default()));
    }

    let (min_date, max_date) = rows
        .iter()
        .fold((NaiveDate::MAX, NaiveDate::MIN), |(lo, hi), r| {
            (lo.min(r.date), hi.max(r.date))
        });

    let existing: HashSet<(String, NaiveDate)> = sqlx::query_as::<_, (String, NaiveDate)>(
        "SELECT user_email, date FROM attendance WHERE date BETWEEN ? AND ?",
    )
    .bind(min_date)
    .bind(max_date)
    .fetch_all(pool.get_ref())
    .await?
    .into_iter()
    .map(|(email, date)| (normalize_email(&email), date))
    .collect();

    let (accepted, mut report) = plan_import(rows, &existing);
    let accepted: Vec<AttendanceUpsert> = accepted
        .into_iter()
        .map(|row| apply_schedule(row, &config.schedule))
        .collect();

    for chunk in accepted.chunks(IMPORT_CHUNK_SIZE) {
        let mut qb = QueryBuilder::<MySql>::new(
            "INSERT IGNORE INTO attendance (user_email, date, status, check_in_time, \
             check_out_time, total_hours, is_late, is_early_checkout, location, remarks) ",
        );
        qb.push_values(chunk, |mut b, row| {
            b.push_bind(&row.user_email)
                .push_bind(row.date)
                .push_bind(row.status.as_ref())
                .push_bind(row.check_in_time)
                .push_bind(row.check_out_time)
                .push_bind(row.total_hours)
                .push_bind(row.is_late)
                .push_bind(row.is_early_checkout)
                .push_bind(row.location.as_deref())
                .push_bind(row.remarks.as_deref());
        });

        let result = qb.build().execute(pool.get_ref()).await?;
        let inserted = result.rows_affected();
        if inserted < chunk.len() as u64 {
            // someone else wrote these days between our read and insert
            warn!(
                skipped = chunk.len() as u64 - inserted,
                "Import chunk hit rows recorded concurrently"
            );
            report.already_recorded += (chunk.len() as u64 - inserted) as usize;
        }
        report.inserted += inserted;
    }

    info!(
        by = %auth.email,
        received = report.received,
        inserted = report.inserted,
        duplicates = report.duplicates_in_payload,
        existing = report.already_recorded,
        "Attendance import finished"
    );

    Ok(HttpResponse::Ok().json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn row(email: &str, day: u32) -> AttendanceUpsert {
        AttendanceUpsert::status_only(
            email,
            NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            AttendanceStatus::Present,
        )
    }

    #[test]
    fn import_skips_payload_duplicates_and_existing_days() {
        let existing: HashSet<(String, NaiveDate)> =
            [("a@x.io".to_string(), NaiveDate::from_ymd_opt(2026, 3, 3).unwrap())]
                .into_iter()
                .collect();

        let mut first = row("A@x.io", 2);
        first.remarks = Some("first".into());
        let mut second = row("a@x.io", 2);
        second.remarks = Some("second".into());

        let rows = vec![first, second, row("a@x.io", 3), row("b@x.io", 3)];
        let (accepted, report) = plan_import(rows, &existing);

        assert_eq!(report.received, 4);
        assert_eq!(report.duplicates_in_payload, 1);
        assert_eq!(report.already_recorded, 1);
        assert_eq!(accepted.len(), 2);
        assert_eq!(accepted[0].user_email, "a@x.io");
        assert_eq!(accepted[0].remarks.as_deref(), Some("first"));
        assert_eq!(accepted[1].user_email, "b@x.io");
    }

    #[test]
    fn import_rejects_rows_a_single_mark_would_refuse() {
        let mut backwards = row("c@x.io", 4);
        backwards.check_in_time = NaiveTime::from_hms_opt(18, 0, 0);
        backwards.check_out_time = NaiveTime::from_hms_opt(9, 0, 0);

        let rows = vec![row("  ", 2), row("a@x.io", 2), backwards, row("b@x.io", 2)];
        let (accepted, report) = plan_import(rows, &HashSet::new());

        assert_eq!(report.received, 4);
        assert_eq!(
            report.rejected,
            vec![
                RejectedRow { index: 0, reason: "user_email is required".into() },
                RejectedRow {
                    index: 2,
                    reason: "check_out_time cannot be before check_in_time".into()
                },
            ]
        );
        let emails: Vec<&str> = accepted.iter().map(|r| r.user_email.as_str()).collect();
        assert_eq!(emails, vec!["a@x.io", "b@x.io"]);
    }

    #[test]
    fn same_times_are_a_valid_row() {
        let mut r = row("a@x.io", 2);
        r.check_in_time = NaiveTime::from_hms_opt(9, 0, 0);
        r.check_out_time = r.check_in_time;
        assert_eq!(validate_row(&r), Ok(()));
    }

    #[test]
    fn import_of_many_rows_chunks_at_one_hundred() {
        let rows: Vec<AttendanceUpsert> = (0..250)
            .map(|i| row(&format!("user{i}@x.io"), 2))
            .collect();
        let (accepted, _) = plan_import(rows, &HashSet::new());

        let sizes: Vec<usize> = accepted.chunks(IMPORT_CHUNK_SIZE).map(|c| c.len()).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
    }

    #[test]
    fn schedule_fills_derived_fields() {
        let schedule = WorkSchedule::default();
        let mut r = row("a@x.io", 2);
        r.check_in_time = NaiveTime::from_hms_opt(9, 16, 0);
        r.check_out_time = NaiveTime::from_hms_opt(17, 40, 0);
        r.is_late = false;
        r.total_hours = Some(99.0);

        let r = apply_schedule(r, &schedule);
        assert!(r.is_late);
        assert!(r.is_early_checkout);
        assert_eq!(r.total_hours, Some(8.4));
    }

    #[test]
    fn schedule_leaves_status_only_rows_alone() {
        let r = apply_schedule(row("a@x.io", 2), &WorkSchedule::default());
        assert!(!r.is_late);
        assert!(!r.is_early_checkout);
        assert_eq!(r.total_hours, None);
    }
}
