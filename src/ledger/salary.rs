use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::aggregate::AttendanceSummary;
use super::{LedgerError, round2};

/// Day counts fed into the salary formula.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct SalaryInputs {
    /// Attended days; a half day counts 0.5.
    #[schema(example = 20.0)]
    pub present_days: f64,
    /// Paid days off: leave of any kind, holidays and weekly offs.
    #[schema(example = 2.0)]
    pub leave_days: f64,
    #[schema(example = 1.0)]
    pub absent_days: f64,
}

impl From<&AttendanceSummary> for SalaryInputs {
    fn from(summary: &AttendanceSummary) -> Self {
        SalaryInputs {
            present_days: (summary.present + summary.work_from_home) as f64
                + 0.5 * summary.half_day as f64,
            leave_days: (summary.leave + summary.holiday + summary.weekoff) as f64,
            absent_days: summary.absent as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
#[schema(example = json!({
    "per_day_rate": 500.0,
    "earned": 11000.0,
    "deduction": 500.0,
    "net_salary": 10500.0
}))]
pub struct SalaryBreakdown {
    pub per_day_rate: f64,
    pub earned: f64,
    pub deduction: f64,
    pub net_salary: f64,
}

/// `earned = (present + leave) * rate`, `deduction = absent * rate`,
/// `net = earned - deduction`.
pub fn calculate(inputs: &SalaryInputs, rate: f64) -> Result<SalaryBreakdown, LedgerError> {
    if !rate.is_finite() || rate < 0.0 {
        return Err(LedgerError::InvalidRate);
    }

    let counts = [inputs.present_days, inputs.leave_days, inputs.absent_days];
    if counts.iter().any(|c| !c.is_finite() || *c < 0.0) {
        return Err(LedgerError::InvalidDayCount);
    }

    let earned = round2((inputs.present_days + inputs.leave_days) * rate);
    let deduction = round2(inputs.absent_days * rate);

    Ok(SalaryBreakdown {
        per_day_rate: rate,
        earned,
        deduction,
        net_salary: round2(earned - deduction),
    })
}
