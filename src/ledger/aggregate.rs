use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use super::calendar::MonthPeriod;
use super::round2;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};

/// Per-user bucket counts for one period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct AttendanceSummary {
    pub user_email: String,
    pub present: u32,
    pub absent: u32,
    pub half_day: u32,
    /// leave, sick_leave and casual_leave together
    pub leave: u32,
    pub work_from_home: u32,
    pub weekoff: u32,
    pub holiday: u32,
    pub total_hours: f64,
    pub present_equivalent_days: f64,
    pub recorded_days: u32,
}

impl AttendanceSummary {
    fn empty(user_email: &str) -> Self {
        Self {
            user_email: user_email.to_string(),
            ..Default::default()
        }
    }

    fn add(&mut self, record: &AttendanceRecord) {
        match record.status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::HalfDay => self.half_day += 1,
            AttendanceStatus::Leave | AttendanceStatus::SickLeave | AttendanceStatus::CasualLeave => {
                self.leave += 1
            }
            AttendanceStatus::WorkFromHome => self.work_from_home += 1,
            AttendanceStatus::Weekoff => self.weekoff += 1,
            AttendanceStatus::Holiday => self.holiday += 1,
        }

        self.recorded_days += 1;
        self.total_hours += record.total_hours.unwrap_or(0.0);
    }

    fn finish(mut self) -> Self {
        self.total_hours = round2(self.total_hours);
        self.present_equivalent_days = (self.present + self.work_from_home + self.leave) as f64
            + 0.5 * self.half_day as f64;
        self
    }
}

/// Collapses records to one per user and day, keeping the last occurrence.
pub fn dedupe_by_day<'a>(
    records: &'a [AttendanceRecord],
    period: &MonthPeriod,
) -> BTreeMap<(&'a str, NaiveDate), &'a AttendanceRecord> {
    let mut latest = BTreeMap::new();
    for record in records.iter().filter(|r| period.contains(r.date)) {
        latest.insert((record.user_email.as_str(), record.date), record);
    }
    latest
}

/// Buckets attendance for every user seen in `records` plus every user in
/// `users`, sorted by email. Users without records get zero counts.
pub fn summarize(
    records: &[AttendanceRecord],
    users: &[String],
    period: &MonthPeriod,
) -> Vec<AttendanceSummary> {
    let mut summaries: BTreeMap<&str, AttendanceSummary> = users
        .iter()
        .map(|email| (email.as_str(), AttendanceSummary::empty(email)))
        .collect();

    for ((email, _), record) in dedupe_by_day(records, period) {
        summaries
            .entry(email)
            .or_insert_with(|| AttendanceSummary::empty(email))
            .add(record);
    }

    summaries
        .into_values()
        .map(AttendanceSummary::finish)
        .collect()
}

pub fn summarize_user(
    records: &[AttendanceRecord],
    user_email: &str,
    period: &MonthPeriod,
) -> AttendanceSummary {
    let mine: Vec<AttendanceRecord> = records
        .iter()
        .filter(|r| r.user_email == user_email)
        .cloned()
        .collect();

    summarize(&mine, &[user_email.to_string()], period)
        .pop()
        .unwrap_or_else(|| AttendanceSummary::empty(user_email).finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn record(email: &str, day: u32, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            id: 0,
            user_email: email.into(),
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

    fn march() -> MonthPeriod {
        MonthPeriod::new(2026, 3).unwrap()
    }

    #[test]
    fn buckets_every_status() {
        use AttendanceStatus::*;
        let records = vec![
            record("a@x.io", 2, Present),
            record("a@x.io", 3, Present),
            record("a@x.io", 4, Absent),
            record("a@x.io", 5, HalfDay),
            record("a@x.io", 6, SickLeave),
            record("a@x.io", 7, CasualLeave),
            record("a@x.io", 8, Weekoff),
            record("a@x.io", 9, WorkFromHome),
            record("a@x.io", 10, Holiday),
            record("a@x.io", 11, Leave),
        ];

        let summary = summarize_user(&records, "a@x.io", &march());
        assert_eq!(summary.present, 2);
        assert_eq!(summary.absent, 1);
        assert_eq!(summary.half_day, 1);
        assert_eq!(summary.leave, 3);
        assert_eq!(summary.weekoff, 1);
        assert_eq!(summary.holiday, 1);
        assert_eq!(summary.work_from_home, 1);
        assert_eq!(summary.recorded_days, 10);
        assert_eq!(summary.present_equivalent_days, 6.5);
    }

    #[test]
    fn duplicate_day_counts_once_and_last_wins() {
        let records = vec![
            record("a@x.io", 2, AttendanceStatus::Absent),
            record("a@x.io", 2, AttendanceStatus::Present),
        ];

        let summary = summarize_user(&records, "a@x.io", &march());
        assert_eq!(summary.present, 1);
        assert_eq!(summary.absent, 0);
        assert_eq!(summary.recorded_days, 1);
    }

    #[test]
    fn records_outside_period_are_ignored() {
        let mut outside = record("a@x.io", 2, AttendanceStatus::Present);
        outside.date = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();

        let summary = summarize_user(&[outside], "a@x.io", &march());
        assert_eq!(summary.recorded_days, 0);
        assert_eq!(summary.present_equivalent_days, 0.0);
    }

    #[test]
    fn users_without_records_are_listed() {
        let records = vec![record("b@x.io", 2, AttendanceStatus::Present)];
        let users = vec!["a@x.io".to_string(), "b@x.io".to_string()];

        let summaries = summarize(&records, &users, &march());
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].user_email, "a@x.io");
        assert_eq!(summaries[0].recorded_days, 0);
        assert_eq!(summaries[1].present, 1);
    }

    #[test]
    fn hours_are_summed_and_rounded() {
        let mut first = record("a@x.io", 2, AttendanceStatus::Present);
        first.total_hours = Some(8.333);
        let mut second = record("a@x.io", 3, AttendanceStatus::Present);
        second.total_hours = Some(7.5);

        let summary = summarize_user(&[first, second], "a@x.io", &march());
        assert_eq!(summary.total_hours, 15.83);
    }

    #[test]
    fn present_equivalent_stays_within_period() {
        let period = march();
        let statuses: Vec<AttendanceStatus> = AttendanceStatus::iter().collect();

        // every day of the month, statuses cycling at several offsets, with
        // each day written twice to exercise deduplication
        for offset in 0..statuses.len() {
            let mut records = Vec::new();
            for day in 1..=period.days() {
                let status = statuses[(day as usize + offset) % statuses.len()];
                records.push(record("a@x.io", day, AttendanceStatus::Present));
                records.push(record("a@x.io", day, status));
            }

            let summary = summarize_user(&records, "a@x.io", &period);
            assert!(summary.present_equivalent_days >= 0.0);
            assert!(summary.present_equivalent_days <= period.days() as f64);
            assert_eq!(summary.recorded_days, period.days());
        }
    }
}
