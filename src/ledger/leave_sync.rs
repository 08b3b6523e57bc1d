use chrono::{NaiveDate, Weekday};

use super::LedgerError;
use super::calendar::working_days;
use crate::model::attendance::{AttendanceStatus, AttendanceUpsert};
use crate::model::leave_request::{LeaveRequest, LeaveStatus};
use crate::model::leave_type::LeaveType;

/// Attendance status written for days covered by an approved leave of
/// this type. An explicit mapping on the leave type wins over the name.
pub fn classify_leave_type(leave_type: &LeaveType) -> AttendanceStatus {
    leave_type
        .attendance_status
        .unwrap_or_else(|| classify_leave_name(&leave_type.name))
}

pub fn classify_leave_name(name: &str) -> AttendanceStatus {
    let name = name.to_lowercase();
    if name.contains("sick") {
        AttendanceStatus::SickLeave
    } else if name.contains("casual") {
        AttendanceStatus::CasualLeave
    } else {
        AttendanceStatus::Leave
    }
}

/// Leave types may only map onto one of the leave statuses.
pub fn validate_leave_status(status: AttendanceStatus) -> Result<AttendanceStatus, LedgerError> {
    if status.is_leave() {
        Ok(status)
    } else {
        Err(LedgerError::NotALeaveStatus(status))
    }
}

/// Fails when `[start, end]` shares a day with one of `existing` that is
/// still pending or already approved. Each working day maps to at most one
/// leave request.
pub fn ensure_no_overlap(
    existing: &[LeaveRequest],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(), LedgerError> {
    if end < start {
        return Err(LedgerError::InvalidRange { start, end });
    }

    match existing.iter().find(|r| {
        r.status != LeaveStatus::Rejected && r.start_date <= end && r.end_date >= start
    }) {
        Some(clash) => Err(LedgerError::OverlappingLeave { existing: clash.id }),
        None => Ok(()),
    }
}

/// One upsert per working day of the request's range.
pub fn plan_leave_attendance(
    request: &LeaveRequest,
    status: AttendanceStatus,
    weekly_off: Weekday,
) -> Result<Vec<AttendanceUpsert>, LedgerError> {
    let status = validate_leave_status(status)?;
    let remarks = format!("Approved leave request #{}", request.id);

    Ok(working_days(request.start_date, request.end_date, weekly_off)?
        .into_iter()
        .map(|date| AttendanceUpsert {
            remarks: Some(remarks.clone()),
            ..AttendanceUpsert::status_only(request.user_email.clone(), date, status)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(start: (u32, u32), end: (u32, u32)) -> LeaveRequest {
        LeaveRequest {
            id: 7,
            user_email: "jane@company.com".into(),
            leave_type_id: 1,
            start_date: NaiveDate::from_ymd_opt(2026, start.0, start.1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, end.0, end.1).unwrap(),
            total_days: 0,
            status: LeaveStatus::Approved,
            reason: None,
            decided_by: None,
            created_at: None,
        }
    }

    fn leave_type(name: &str, explicit: Option<AttendanceStatus>) -> LeaveType {
        LeaveType {
            id: 1,
            name: name.into(),
            attendance_status: explicit,
            annual_allocation: 10.0,
        }
    }

    #[test]
    fn five_days_over_a_sunday_yield_four_records() {
        // Thu 5 .. Mon 9 March 2026, Sunday the 8th
        let plan =
            plan_leave_attendance(&request((3, 5), (3, 9)), AttendanceStatus::Leave, Weekday::Sun)
                .unwrap();

        assert_eq!(plan.len(), 4);
        assert!(plan.iter().all(|u| u.status == AttendanceStatus::Leave));
        assert!(plan.iter().all(|u| u.user_email == "jane@company.com"));
        assert!(
            plan.iter()
                .all(|u| u.remarks.as_deref() == Some("Approved leave request #7"))
        );
        let dates: Vec<u32> = plan.iter().map(|u| chrono::Datelike::day(&u.date)).collect();
        assert_eq!(dates, vec![5, 6, 7, 9]);
    }

    #[test]
    fn range_across_months() {
        let plan = plan_leave_attendance(
            &request((3, 30), (4, 2)),
            AttendanceStatus::CasualLeave,
            Weekday::Sun,
        )
        .unwrap();
        assert_eq!(plan.len(), 4);
    }

    #[test]
    fn reversed_range_is_rejected() {
        let err = plan_leave_attendance(&request((3, 9), (3, 5)), AttendanceStatus::Leave, Weekday::Sun)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRange { .. }));
    }

    #[test]
    fn non_leave_status_is_rejected() {
        let err =
            plan_leave_attendance(&request((3, 5), (3, 6)), AttendanceStatus::Present, Weekday::Sun)
                .unwrap_err();
        assert_eq!(err, LedgerError::NotALeaveStatus(AttendanceStatus::Present));
    }

    #[test]
    fn names_are_classified_case_insensitively() {
        assert_eq!(classify_leave_name("Sick Leave"), AttendanceStatus::SickLeave);
        assert_eq!(classify_leave_name("CASUAL"), AttendanceStatus::CasualLeave);
        assert_eq!(classify_leave_name("Annual"), AttendanceStatus::Leave);
        assert_eq!(classify_leave_name("Sickness Cover"), AttendanceStatus::SickLeave);
    }

    #[test]
    fn explicit_mapping_wins_over_name() {
        let lt = leave_type("Wellbeing day", Some(AttendanceStatus::SickLeave));
        assert_eq!(classify_leave_type(&lt), AttendanceStatus::SickLeave);

        let lt = leave_type("Casual", None);
        assert_eq!(classify_leave_type(&lt), AttendanceStatus::CasualLeave);
    }

    #[test]
    fn same_range_twice_overlaps() {
        let pending = LeaveRequest {
            status: LeaveStatus::Pending,
            ..request((3, 5), (3, 9))
        };
        let d = |month, day| NaiveDate::from_ymd_opt(2026, month, day).unwrap();

        assert_eq!(
            ensure_no_overlap(&[pending.clone()], d(3, 5), d(3, 9)),
            Err(LedgerError::OverlappingLeave { existing: 7 })
        );
        // touching either end still shares a day
        assert!(ensure_no_overlap(&[pending.clone()], d(3, 9), d(3, 12)).is_err());
        assert!(ensure_no_overlap(&[pending.clone()], d(3, 1), d(3, 5)).is_err());
        assert!(ensure_no_overlap(&[pending.clone()], d(3, 10), d(3, 12)).is_ok());

        // approved requests block too, rejected ones don't
        let approved = LeaveRequest {
            status: LeaveStatus::Approved,
            ..pending.clone()
        };
        assert!(ensure_no_overlap(&[approved], d(3, 6), d(3, 6)).is_err());
        let rejected = LeaveRequest {
            status: LeaveStatus::Rejected,
            ..pending
        };
        assert!(ensure_no_overlap(&[rejected], d(3, 6), d(3, 6)).is_ok());
    }
}
