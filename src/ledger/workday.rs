use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use utoipa::ToSchema;

use super::aggregate::dedupe_by_day;
use super::calendar::MonthPeriod;
use super::{LedgerError, round2};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};

/// One day of an employee's month: what happened and what it does to the
/// month's net salary.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WorkdayEntry {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    /// `None` when nothing was recorded for the day.
    pub status: Option<AttendanceStatus>,
    pub weekly_off: bool,
    pub salary_weight: f64,
    /// Negative for an absence.
    pub amount: f64,
}

/// Day-by-day ledger for one user. Weights follow the salary rule, so
/// unrecorded days (weekly off included) weigh nothing and the total is
/// the month's net salary.
pub fn build_ledger(
    records: &[AttendanceRecord],
    user_email: &str,
    period: &MonthPeriod,
    rate: f64,
    weekly_off: Weekday,
) -> Result<Vec<WorkdayEntry>, LedgerError> {
    if !rate.is_finite() || rate < 0.0 {
        return Err(LedgerError::InvalidRate);
    }

    let by_day = dedupe_by_day(records, period);

    Ok(period
        .dates()
        .map(|date| {
            let status = by_day.get(&(user_email, date)).map(|r| r.status);
            let salary_weight = status.map_or(0.0, AttendanceStatus::salary_weight);

            WorkdayEntry {
                date,
                status,
                weekly_off: date.weekday() == weekly_off,
                salary_weight,
                amount: round2(salary_weight * rate),
            }
        })
        .collect())
}

pub fn ledger_total(entries: &[WorkdayEntry]) -> f64 {
    round2(entries.iter().map(|e| e.amount).sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::aggregate::summarize_user;
    use crate::ledger::salary::{SalaryInputs, calculate};

    fn record(day: u32, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            id: day as u64,
            user_email: "a@x.io".into(),
            date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            status,
            check_in_time: None,
            check_out_time: None,
            total_hours: None,
            is_late: false,
            is_early_checkout: false,
            location: None,
            remarks: None,
        }
    }

    fn net_salary(records: &[AttendanceRecord], period: &MonthPeriod, rate: f64) -> f64 {
        let summary = summarize_user(records, "a@x.io", period);
        calculate(&SalaryInputs::from(&summary), rate)
            .unwrap()
            .net_salary
    }

    #[test]
    fn one_entry_per_calendar_day() {
        let period = MonthPeriod::new(2026, 3).unwrap();
        let ledger = build_ledger(&[], "a@x.io", &period, 100.0, Weekday::Sun).unwrap();

        assert_eq!(ledger.len(), 31);
        // five Sundays in March 2026
        assert_eq!(ledger.iter().filter(|e| e.weekly_off).count(), 5);
        assert!(ledger.iter().all(|e| e.status.is_none()));
        assert_eq!(ledger_total(&ledger), 0.0);
    }

    #[test]
    fn recorded_days_carry_salary_weights() {
        let period = MonthPeriod::new(2026, 3).unwrap();
        let records = vec![
            record(2, AttendanceStatus::Present),
            record(3, AttendanceStatus::HalfDay),
            record(4, AttendanceStatus::Absent),
            // worked on a Sunday
            record(8, AttendanceStatus::Present),
        ];

        let ledger = build_ledger(&records, "a@x.io", &period, 200.0, Weekday::Sun).unwrap();
        assert_eq!(ledger[1].amount, 200.0);
        assert_eq!(ledger[2].amount, 100.0);
        assert_eq!(ledger[3].amount, -200.0);
        assert_eq!(ledger[3].status, Some(AttendanceStatus::Absent));
        assert_eq!(ledger[7].status, Some(AttendanceStatus::Present));
        assert!(ledger[7].weekly_off);
        // unrecorded Monday
        assert_eq!(ledger[8].status, None);
        assert_eq!(ledger[8].salary_weight, 0.0);
    }

    #[test]
    fn total_matches_net_salary() {
        let period = MonthPeriod::new(2026, 3).unwrap();
        let rate = 100.0;

        let single_absence = vec![record(4, AttendanceStatus::Absent)];
        let ledger = build_ledger(&single_absence, "a@x.io", &period, rate, Weekday::Sun).unwrap();
        assert_eq!(ledger_total(&ledger), -100.0);
        assert_eq!(ledger_total(&ledger), net_salary(&single_absence, &period, rate));

        let mixed = vec![
            record(2, AttendanceStatus::Present),
            record(3, AttendanceStatus::WorkFromHome),
            record(4, AttendanceStatus::HalfDay),
            record(5, AttendanceStatus::SickLeave),
            record(6, AttendanceStatus::Holiday),
            record(8, AttendanceStatus::Weekoff),
            record(9, AttendanceStatus::Absent),
            record(10, AttendanceStatus::CasualLeave),
        ];
        let ledger = build_ledger(&mixed, "a@x.io", &period, 250.0, Weekday::Sun).unwrap();
        assert_eq!(ledger_total(&ledger), net_salary(&mixed, &period, 250.0));
        assert_eq!(ledger_total(&ledger), 1375.0);
    }

    #[test]
    fn other_users_are_ignored() {
        let period = MonthPeriod::new(2026, 3).unwrap();
        let mut other = record(2, AttendanceStatus::Present);
        other.user_email = "b@x.io".into();

        let ledger = build_ledger(&[other], "a@x.io", &period, 10.0, Weekday::Sun).unwrap();
        assert_eq!(ledger[1].status, None);
    }

    #[test]
    fn negative_rate_rejected() {
        let period = MonthPeriod::new(2026, 3).unwrap();
        assert_eq!(
            build_ledger(&[], "a@x.io", &period, -5.0, Weekday::Sun),
            Err(LedgerError::InvalidRate)
        );
    }
}
