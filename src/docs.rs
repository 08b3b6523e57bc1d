use crate::api::attendance::{
    AttendanceSummaryResponse, BulkImportRequest, ImportReport, RejectedRow,
};
use crate::api::leave::{AllocateBalance, CreateLeave, CreateLeaveType, LeaveFilter, LeaveListResponse};
use crate::api::salary::{
    CalculateSalary, PaginatedSalaryResponse, SalaryListQuery, SalaryPreview, SaveSalary,
    WorkdayLedger,
};
use crate::ledger::aggregate::AttendanceSummary;
use crate::ledger::salary::{SalaryBreakdown, SalaryInputs};
use crate::ledger::workday::WorkdayEntry;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, AttendanceUpsert};
use crate::model::leave_balance::LeaveBalance;
use crate::model::leave_request::{LeaveRequest, LeaveStatus};
use crate::model::leave_type::LeaveType;
use crate::model::salary::SalaryRecord;
use crate::models::{LoginReqDto, RegisterReq, TokenPair};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Workday Ledger API",
        version = "1.0.0",
        description = r#"
## Attendance, leave and salary reconciliation

- **Attendance**: check-in/check-out with late and early-checkout flags, manual marking, bulk import and monthly summaries
- **Leave**: leave types, requests with pending balance holds, approval that writes one attendance record per working day
- **Salary**: per-day-rate calculation from the month's attendance, workday ledger, saved monthly records

Every `/api` endpoint needs a JWT bearer access token from `/auth/login`.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::mark_attendance,
        crate::api::attendance::update_attendance,
        crate::api::attendance::list_attendance,
        crate::api::attendance::attendance_summary,
        crate::api::attendance::import_attendance,

        crate::api::leave::list_leave_types,
        crate::api::leave::create_leave_type,
        crate::api::leave::create_leave,
        crate::api::leave::approve_leave,
        crate::api::leave::reject_leave,
        crate::api::leave::get_leave,
        crate::api::leave::leave_list,
        crate::api::leave::list_balances,
        crate::api::leave::allocate_balance,

        crate::api::salary::calculate_salary,
        crate::api::salary::preview_salary,
        crate::api::salary::workday_ledger,
        crate::api::salary::save_salary,
        crate::api::salary::get_salary,
        crate::api::salary::list_salaries
    ),
    components(
        schemas(
            RegisterReq,
            LoginReqDto,
            TokenPair,
            AttendanceStatus,
            AttendanceRecord,
            AttendanceUpsert,
            AttendanceSummary,
            AttendanceSummaryResponse,
            BulkImportRequest,
            ImportReport,
            RejectedRow,
            LeaveType,
            LeaveStatus,
            LeaveRequest,
            LeaveBalance,
            CreateLeaveType,
            CreateLeave,
            LeaveFilter,
            LeaveListResponse,
            AllocateBalance,
            SalaryInputs,
            SalaryBreakdown,
            SalaryRecord,
            WorkdayEntry,
            CalculateSalary,
            SalaryPreview,
            WorkdayLedger,
            SaveSalary,
            SalaryListQuery,
            PaginatedSalaryResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, login and token rotation"),
        (name = "Attendance", description = "Attendance tracking APIs"),
        (name = "Leave", description = "Leave types, requests and balances"),
        (name = "Salary", description = "Salary calculation APIs"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_route_group() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();

        for expected in [
            "/auth/login",
            "/api/attendance/check-in",
            "/api/attendance/import",
            "/api/leave/{leave_id}/approve",
            "/api/leave/balances",
            "/api/salary/calculate",
        ] {
            assert!(paths.iter().any(|p| p.as_str() == expected), "{expected} missing");
        }

        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
