use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::api::attendance::fetch_month_records;
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::AppError;
use crate::ledger::aggregate::{AttendanceSummary, summarize_user};
use crate::ledger::calendar::MonthPeriod;
use crate::ledger::salary::{SalaryBreakdown, SalaryInputs, calculate};
use crate::ledger::workday::{WorkdayEntry, build_ledger, ledger_total};
use crate::model::salary::SalaryRecord;
use crate::models::normalize_email;

const SALARY_COLUMNS: &str = "id, user_email, year, month, per_day_rate, present_days, leave_days, \
     absent_days, half_days, earned, deduction, net_salary, created_at";

#[derive(Deserialize, ToSchema)]
pub struct CalculateSalary {
    #[schema(example = 500.0)]
    pub per_day_rate: f64,
    #[schema(example = 20.0)]
    pub present_days: f64,
    #[schema(example = 2.0)]
    pub leave_days: f64,
    #[schema(example = 1.0)]
    pub absent_days: f64,
}

#[derive(Deserialize, IntoParams)]
pub struct SalaryQuery {
    /// Defaults to the caller
    pub user_email: Option<String>,
    pub year: i32,
    pub month: u32,
    /// Per-day rate
    pub rate: f64,
}

#[derive(Serialize, ToSchema)]
pub struct SalaryPreview {
    pub user_email: String,
    pub year: i32,
    pub month: u32,
    pub summary: AttendanceSummary,
    pub inputs: SalaryInputs,
    pub breakdown: SalaryBreakdown,
}

#[derive(Serialize, ToSchema)]
pub struct WorkdayLedger {
    pub user_email: String,
    pub year: i32,
    pub month: u32,
    pub per_day_rate: f64,
    pub entries: Vec<WorkdayEntry>,
    pub total: f64,
}

#[derive(Deserialize, ToSchema)]
pub struct SaveSalary {
    #[schema(example = "jane@company.com")]
    pub user_email: String,
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 3)]
    pub month: u32,
    #[schema(example = 500.0)]
    pub per_day_rate: f64,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct SalaryListQuery {
    #[schema(example = 1)]
    pub page: Option<u32>,
    #[schema(example = 10)]
    pub per_page: Option<u32>,
    pub user_email: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedSalaryResponse {
    pub data: Vec<SalaryRecord>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// Summary and salary of one user's month, computed from stored
/// attendance.
async fn month_summary(
    pool: &MySqlPool,
    user_email: &str,
    period: &MonthPeriod,
) -> Result<AttendanceSummary, AppError> {
    let records = fetch_month_records(pool, Some(user_email), period).await?;
    Ok(summarize_user(&records, user_email, period))
}

/// Pure calculator over the supplied day counts
#[utoipa::path(
    post,
    path = "/api/salary/calculate",
    request_body = CalculateSalary,
    responses(
        (status = 200, body = SalaryBreakdown),
        (status = 400, description = "Negative rate or day count")
    ),
    security(("bearer_auth" = [])),
    tag = "Salary"
)]
pub async fn calculate_salary(
    _auth: AuthUser,
    payload: web::Json<CalculateSalary>,
) -> Result<HttpResponse, AppError> {
    let inputs = SalaryInputs {
        present_days: payload.present_days,
        leave_days: payload.leave_days,
        absent_days: payload.absent_days,
    };
    let breakdown = calculate(&inputs, payload.per_day_rate)?;

    Ok(HttpResponse::Ok().json(breakdown))
}

/// Salary for a month from stored attendance. Nothing is saved.
#[utoipa::path(
    get,
    path = "/api/salary/preview",
    params(SalaryQuery),
    responses(
        (status = 200, body = SalaryPreview),
        (status = 403, description = "Another user's salary")
    ),
    security(("bearer_auth" = [])),
    tag = "Salary"
)]
pub async fn preview_salary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SalaryQuery>,
) -> Result<HttpResponse, AppError> {
    let email = normalize_email(query.user_email.as_deref().unwrap_or(&auth.email));
    auth.require_self_or_hr(&email)?;

    let period = MonthPeriod::new(query.year, query.month)?;
    let summary = month_summary(pool.get_ref(), &email, &period).await?;
    let inputs = SalaryInputs::from(&summary);
    let breakdown = calculate(&inputs, query.rate)?;

    Ok(HttpResponse::Ok().json(SalaryPreview {
        user_email: email,
        year: period.year,
        month: period.month,
        summary,
        inputs,
        breakdown,
    }))
}

/// Day-by-day pay for a month
#[utoipa::path(
    get,
    path = "/api/salary/ledger",
    params(SalaryQuery),
    responses((status = 200, body = WorkdayLedger)),
    security(("bearer_auth" = [])),
    tag = "Salary"
)]
pub async fn workday_ledger(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<SalaryQuery>,
) -> Result<HttpResponse, AppError> {
    let email = normalize_email(query.user_email.as_deref().unwrap_or(&auth.email));
    auth.require_self_or_hr(&email)?;

    let period = MonthPeriod::new(query.year, query.month)?;
    let records = fetch_month_records(pool.get_ref(), Some(&email), &period).await?;
    let entries = build_ledger(
        &records,
        &email,
        &period,
        query.rate,
        config.schedule.weekly_off,
    )?;

    Ok(HttpResponse::Ok().json(WorkdayLedger {
        total: ledger_total(&entries),
        user_email: email,
        year: period.year,
        month: period.month,
        per_day_rate: query.rate,
        entries,
    }))
}

/// Saves a month's salary, recomputed from stored attendance. Saving the
/// same user and month again overwrites the earlier record.
#[utoipa::path(
    post,
    path = "/api/salary",
    request_body = SaveSalary,
    responses(
        (status = 201, description = "Salary saved", body = SalaryRecord),
        (status = 400, description = "Invalid period or rate"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Salary"
)]
pub async fn save_salary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<SaveSalary>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let email = normalize_email(&payload.user_email);
    if email.is_empty() {
        return Err(AppError::BadRequest("user_email is required".into()));
    }

    let period = MonthPeriod::new(payload.year, payload.month)?;
    let summary = month_summary(pool.get_ref(), &email, &period).await?;
    let inputs = SalaryInputs::from(&summary);
    let breakdown = calculate(&inputs, payload.per_day_rate)?;

    sqlx::query(
        r#"
        INSERT INTO salary_records
            (user_email, year, month, per_day_rate, present_days, leave_days,
             absent_days, half_days, earned, deduction, net_salary)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            per_day_rate = VALUES(per_day_rate),
            present_days = VALUES(present_days),
            leave_days = VALUES(leave_days),
            absent_days = VALUES(absent_days),
            half_days = VALUES(half_days),
            earned = VALUES(earned),
            deduction = VALUES(deduction),
            net_salary = VALUES(net_salary)
        "#,
    )
    .bind(&email)
    .bind(period.year)
    .bind(period.month)
    .bind(breakdown.per_day_rate)
    .bind(inputs.present_days)
    .bind(inputs.leave_days)
    .bind(inputs.absent_days)
    .bind(summary.half_day)
    .bind(breakdown.earned)
    .bind(breakdown.deduction)
    .bind(breakdown.net_salary)
    .execute(pool.get_ref())
    .await?;

    let record = sqlx::query_as::<_, SalaryRecord>(&format!(
        "SELECT {SALARY_COLUMNS} FROM salary_records WHERE user_email = ? AND year = ? AND month = ?"
    ))
    .bind(&email)
    .bind(period.year)
    .bind(period.month)
    .fetch_one(pool.get_ref())
    .await?;

    info!(
        by = %auth.email,
        user = %email,
        year = period.year,
        month = period.month,
        net = record.net_salary,
        "Salary saved"
    );

    Ok(HttpResponse::Created().json(record))
}

#[utoipa::path(
    get,
    path = "/api/salary/{salary_id}",
    params(("salary_id" = u64, Path, description = "Salary record ID")),
    responses(
        (status = 200, body = SalaryRecord),
        (status = 404, description = "Salary record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Salary"
)]
pub async fn get_salary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let salary_id = path.into_inner();

    let record = sqlx::query_as::<_, SalaryRecord>(&format!(
        "SELECT {SALARY_COLUMNS} FROM salary_records WHERE id = ?"
    ))
    .bind(salary_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::NotFound("Salary record not found".into()))?;

    auth.require_self_or_hr(&record.user_email)?;

    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    get,
    path = "/api/salary",
    params(SalaryListQuery),
    responses((status = 200, body = PaginatedSalaryResponse)),
    security(("bearer_auth" = [])),
    tag = "Salary"
)]
pub async fn list_salaries(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SalaryListQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
    let offset = (page - 1) * per_page;
    let user_email = query.user_email.as_deref().map(normalize_email);

    let where_sql = if user_email.is_some() {
        " WHERE user_email = ?"
    } else {
        ""
    };

    let count_sql = format!("SELECT COUNT(*) FROM salary_records{where_sql}");
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(email) = &user_email {
        count_q = count_q.bind(email);
    }
    let total = count_q.fetch_one(pool.get_ref()).await?;

    let data_sql = format!(
        "SELECT {SALARY_COLUMNS} FROM salary_records{where_sql} \
         ORDER BY year DESC, month DESC, user_email LIMIT ? OFFSET ?"
    );
    let mut data_q = sqlx::query_as::<_, SalaryRecord>(&data_sql);
    if let Some(email) = &user_email {
        data_q = data_q.bind(email);
    }
    let data = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(PaginatedSalaryResponse {
        data,
        page,
        per_page,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::generate_access_token;
    use crate::auth::middleware::auth_middleware;
    use actix_web::middleware::from_fn;
    use actix_web::{App, http::StatusCode, test};
    use serde_json::{Value, json};

    fn config() -> Config {
        Config::from_lookup(|key| match key {
            "SERVER_ADDR" => Some("127.0.0.1:0".into()),
            "DATABASE_URL" => Some("mysql://localhost/unused".into()),
            "JWT_SECRET" => Some("test-secret".into()),
            _ => None,
        })
        .unwrap()
    }

    fn bearer(role: u8) -> (&'static str, String) {
        let token = generate_access_token(1, "jane@company.com", role, "test-secret", 60).unwrap();
        ("Authorization", format!("Bearer {token}"))
    }

    macro_rules! calculator_app {
        () => {
            test::init_service(
                App::new().app_data(web::Data::new(config())).service(
                    web::scope("/api")
                        .wrap(from_fn(auth_middleware))
                        .route("/salary/calculate", web::post().to(calculate_salary)),
                ),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn calculator_returns_breakdown() {
        let app = calculator_app!();
        let req = test::TestRequest::post()
            .uri("/api/salary/calculate")
            .insert_header(bearer(3))
            .set_json(json!({
                "per_day_rate": 500.0,
                "present_days": 20.0,
                "leave_days": 2.0,
                "absent_days": 1.0
            }))
            .to_request();

        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["earned"], 11000.0);
        assert_eq!(body["deduction"], 500.0);
        assert_eq!(body["net_salary"], 10500.0);
    }

    #[actix_web::test]
    async fn calculator_rejects_negative_rate() {
        let app = calculator_app!();
        let req = test::TestRequest::post()
            .uri("/api/salary/calculate")
            .insert_header(bearer(3))
            .set_json(json!({
                "per_day_rate": -1.0,
                "present_days": 20.0,
                "leave_days": 0.0,
                "absent_days": 0.0
            }))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "INVALID_INPUT");
    }

    #[actix_web::test]
    async fn calculator_requires_a_token() {
        let app = calculator_app!();
        let req = test::TestRequest::post()
            .uri("/api/salary/calculate")
            .set_json(json!({
                "per_day_rate": 500.0,
                "present_days": 1.0,
                "leave_days": 0.0,
                "absent_days": 0.0
            }))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "UNAUTHORIZED");
    }
}
