//! Attendance, leave and salary reconciliation.
//!
//! Everything in here is pure: callers load records from the database,
//! hand them to these functions and persist whatever comes back.

pub mod aggregate;
pub mod balance;
pub mod calendar;
pub mod lateness;
pub mod leave_sync;
pub mod salary;
pub mod workday;

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::attendance::AttendanceStatus;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("invalid period {year}-{month}")]
    InvalidPeriod { year: i32, month: u32 },

    #[error("end date {end} is before start date {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("per-day rate must be a finite, non-negative amount")]
    InvalidRate,

    #[error("day counts must be finite and non-negative")]
    InvalidDayCount,

    #[error("requested {requested} days but only {available} available")]
    InsufficientBalance { requested: f64, available: f64 },

    #[error("cannot settle {requested} days, only {pending} pending")]
    BalanceUnderflow { requested: f64, pending: f64 },

    #[error("allocation {allocated} is below the {committed} days already used or pending")]
    AllocationTooSmall { allocated: f64, committed: f64 },

    #[error("overlaps leave request #{existing}")]
    OverlappingLeave { existing: u64 },

    #[error("{0} is not a leave status")]
    NotALeaveStatus(AttendanceStatus),

    #[error("unknown status: {0}")]
    UnknownStatus(String),
}

/// Rounds a money or hour amount to two decimals.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
