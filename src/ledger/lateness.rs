use chrono::{DateTime, Duration, NaiveDate, NaiveTime, SubsecRound, Utc, Weekday};
use chrono_tz::Tz;

use super::round2;

/// Office hours and the tolerances applied to them.
#[derive(Debug, Clone)]
pub struct WorkSchedule {
    pub work_start: NaiveTime,
    pub work_end: NaiveTime,
    pub late_threshold_minutes: u32,
    pub early_checkout_threshold_minutes: u32,
    pub weekly_off: Weekday,
    pub time_zone: Tz,
}

impl Default for WorkSchedule {
    fn default() -> Self {
        Self {
            work_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            work_end: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
            late_threshold_minutes: 15,
            early_checkout_threshold_minutes: 15,
            weekly_off: Weekday::Sun,
            time_zone: Tz::UTC,
        }
    }
}

impl WorkSchedule {
    /// Business-local date and time of an instant, truncated to whole
    /// seconds to match what a `TIME` column keeps.
    pub fn local(&self, instant: DateTime<Utc>) -> (NaiveDate, NaiveTime) {
        let local = instant.trunc_subsecs(0).with_timezone(&self.time_zone);
        (local.date_naive(), local.time())
    }

    pub fn is_late(&self, check_in: NaiveTime) -> bool {
        is_late(check_in, self.work_start, self.late_threshold_minutes)
    }

    pub fn is_early_checkout(&self, check_out: NaiveTime) -> bool {
        is_early_checkout(check_out, self.work_end, self.early_checkout_threshold_minutes)
    }
}

/// Late means strictly after `work_start + threshold`.
pub fn is_late(check_in: NaiveTime, work_start: NaiveTime, threshold_minutes: u32) -> bool {
    let (deadline, wrapped) =
        work_start.overflowing_add_signed(Duration::minutes(threshold_minutes as i64));
    // a grace period running past midnight can't be missed the same day
    wrapped == 0 && check_in > deadline
}

/// Early means strictly before `work_end - threshold`.
pub fn is_early_checkout(check_out: NaiveTime, work_end: NaiveTime, threshold_minutes: u32) -> bool {
    let (cutoff, wrapped) =
        work_end.overflowing_sub_signed(Duration::minutes(threshold_minutes as i64));
    wrapped == 0 && check_out < cutoff
}

/// Hours between check-in and check-out, two decimals. `None` when the
/// check-out is before the check-in.
pub fn worked_hours(check_in: NaiveTime, check_out: NaiveTime) -> Option<f64> {
    if check_out < check_in {
        return None;
    }
    let seconds = (check_out - check_in).num_seconds() as f64;
    Some(round2(seconds / 3600.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn late_boundary() {
        let start = t(9, 0);
        assert!(!is_late(t(9, 15), start, 15));
        assert!(is_late(t(9, 16), start, 15));
        assert!(!is_late(t(8, 50), start, 15));
    }

    #[test]
    fn late_with_zero_threshold() {
        assert!(!is_late(t(9, 0), t(9, 0), 0));
        assert!(is_late(NaiveTime::from_hms_opt(9, 0, 1).unwrap(), t(9, 0), 0));
    }

    #[test]
    fn grace_past_midnight_is_never_late() {
        assert!(!is_late(t(23, 59), t(23, 50), 30));
    }

    #[test]
    fn early_checkout_boundary() {
        let end = t(18, 0);
        assert!(!is_early_checkout(t(17, 45), end, 15));
        assert!(is_early_checkout(t(17, 44), end, 15));
        assert!(!is_early_checkout(t(18, 30), end, 15));
        assert!(!is_early_checkout(t(0, 5), t(0, 10), 30));
    }

    #[test]
    fn worked_hours_rounding_and_order() {
        assert_eq!(worked_hours(t(9, 0), t(17, 30)), Some(8.5));
        assert_eq!(worked_hours(t(9, 5), t(18, 1)), Some(8.93));
        assert_eq!(worked_hours(t(18, 0), t(9, 0)), None);
    }

    #[test]
    fn schedule_uses_business_time_zone() {
        let schedule = WorkSchedule {
            time_zone: chrono_tz::Asia::Dhaka,
            ..WorkSchedule::default()
        };

        // 03:20 UTC is 09:20 in Dhaka (UTC+6)
        let instant = Utc.with_ymd_and_hms(2026, 3, 2, 3, 20, 0).unwrap();
        let (date, time) = schedule.local(instant);
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(time, t(9, 20));
        assert!(schedule.is_late(time));
    }

    #[test]
    fn fractional_second_at_the_deadline_is_on_time() {
        let schedule = WorkSchedule::default();
        let instant = Utc
            .with_ymd_and_hms(2026, 3, 2, 9, 15, 0)
            .unwrap()
            .checked_add_signed(Duration::milliseconds(400))
            .unwrap();

        let (_, time) = schedule.local(instant);
        assert_eq!(time, t(9, 15));
        assert!(!schedule.is_late(time));
    }
}
