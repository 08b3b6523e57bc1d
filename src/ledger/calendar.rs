use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;

use super::LedgerError;

/// One calendar month, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthPeriod {
    pub year: i32,
    pub month: u32,
    first: NaiveDate,
    last: NaiveDate,
}

impl MonthPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self, LedgerError> {
        let invalid = || LedgerError::InvalidPeriod { year, month };

        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        let last = NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .and_then(|d| d.pred_opt())
            .ok_or_else(invalid)?;

        Ok(Self {
            year,
            month,
            first,
            last,
        })
    }

    pub fn first(&self) -> NaiveDate {
        self.first
    }

    pub fn last(&self) -> NaiveDate {
        self.last
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.first && date <= self.last
    }

    pub fn days(&self) -> u32 {
        self.last.day()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let last = self.last;
        self.first.iter_days().take_while(move |d| *d <= last)
    }
}

/// Calendar days in `[start, end]` that are not the weekly off day.
pub fn working_days(
    start: NaiveDate,
    end: NaiveDate,
    weekly_off: Weekday,
) -> Result<Vec<NaiveDate>, LedgerError> {
    if end < start {
        return Err(LedgerError::InvalidRange { start, end });
    }

    Ok(start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| d.weekday() != weekly_off)
        .collect())
}

pub fn count_working_days(
    start: NaiveDate,
    end: NaiveDate,
    weekly_off: Weekday,
) -> Result<u32, LedgerError> {
    working_days(start, end, weekly_off).map(|days| days.len() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_period_bounds() {
        let feb = MonthPeriod::new(2024, 2).unwrap();
        assert_eq!(feb.first(), date(2024, 2, 1));
        assert_eq!(feb.last(), date(2024, 2, 29));
        assert_eq!(feb.days(), 29);
        assert_eq!(feb.dates().count(), 29);

        let dec = MonthPeriod::new(2025, 12).unwrap();
        assert_eq!(dec.last(), date(2025, 12, 31));
    }

    #[test]
    fn month_period_rejects_bad_month() {
        assert_eq!(
            MonthPeriod::new(2025, 13),
            Err(LedgerError::InvalidPeriod {
                year: 2025,
                month: 13
            })
        );
        assert!(MonthPeriod::new(2025, 0).is_err());
    }

    #[test]
    fn contains_only_own_month() {
        let period = MonthPeriod::new(2026, 3).unwrap();
        assert_eq!(period.month, 3);
        assert!(period.contains(date(2026, 3, 31)));
        assert!(!period.contains(date(2026, 4, 1)));
    }

    #[test]
    fn working_days_skip_sunday() {
        // 2026-03-05 is a Thursday, 2026-03-08 a Sunday
        let days = working_days(date(2026, 3, 5), date(2026, 3, 9), Weekday::Sun).unwrap();
        assert_eq!(days.len(), 4);
        assert!(!days.contains(&date(2026, 3, 8)));
    }

    #[test]
    fn working_days_single_day_and_reversed_range() {
        assert_eq!(
            count_working_days(date(2026, 3, 8), date(2026, 3, 8), Weekday::Sun).unwrap(),
            0
        );
        assert_eq!(
            count_working_days(date(2026, 3, 9), date(2026, 3, 9), Weekday::Sun).unwrap(),
            1
        );
        assert!(working_days(date(2026, 3, 9), date(2026, 3, 1), Weekday::Sun).is_err());
    }
}
