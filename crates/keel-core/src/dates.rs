//! Month-boundary date arithmetic shared by the engine components
//!
//! All callers normalize to UTC before touching these helpers.

use chrono::{Datelike, NaiveDate};

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

/// Number of days in the month containing `date`
pub fn days_in_month(date: NaiveDate) -> i64 {
    let start = month_start(date);
    (add_months(start, 1) - start).num_days()
}

/// Days left in the month, counting `date` itself (never below 1)
pub fn days_remaining_in_month(date: NaiveDate) -> i64 {
    (days_in_month(date) - date.day() as i64 + 1).max(1)
}

/// Shift a date forward by whole calendar months, clamping the day to the
/// target month's length (Jan 31 + 1 month = Feb 28/29).
pub fn add_months(date: NaiveDate, months: i64) -> NaiveDate {
    let total = date.year() as i64 * 12 + date.month0() as i64 + months;
    let year = total.div_euclid(12) as i32;
    let month = total.rem_euclid(12) as u32 + 1;

    NaiveDate::from_ymd_opt(year, month, date.day()).unwrap_or_else(|| {
        let first_of_next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .expect("valid first of month");
        first_of_next.pred_opt().expect("valid last day of month")
    })
}

/// Whole calendar months from `from` until `deadline`; a deadline later in
/// the same month counts as one. Never negative.
pub fn months_until(from: NaiveDate, deadline: NaiveDate) -> i64 {
    if deadline <= from {
        return 0;
    }
    let months = (deadline.year() as i64 * 12 + deadline.month0() as i64)
        - (from.year() as i64 * 12 + from.month0() as i64);
    months.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_month_start() {
        assert_eq!(month_start(d(2026, 6, 15)), d(2026, 6, 1));
        assert_eq!(month_start(d(2026, 1, 1)), d(2026, 1, 1));
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(d(2026, 2, 10)), 28);
        assert_eq!(days_in_month(d(2028, 2, 10)), 29);
        assert_eq!(days_in_month(d(2026, 7, 31)), 31);
    }

    #[test]
    fn test_days_remaining() {
        assert_eq!(days_remaining_in_month(d(2026, 6, 30)), 1);
        assert_eq!(days_remaining_in_month(d(2026, 6, 1)), 30);
    }

    #[test]
    fn test_add_months_clamps_day() {
        assert_eq!(add_months(d(2026, 1, 31), 1), d(2026, 2, 28));
        assert_eq!(add_months(d(2026, 1, 15), 12), d(2027, 1, 15));
        assert_eq!(add_months(d(2026, 12, 5), 1), d(2027, 1, 5));
        assert_eq!(add_months(d(2026, 3, 15), -2), d(2026, 1, 15));
    }

    #[test]
    fn test_months_until() {
        assert_eq!(months_until(d(2026, 1, 15), d(2027, 1, 15)), 12);
        assert_eq!(months_until(d(2026, 1, 1), d(2026, 1, 1)), 0);
        assert_eq!(months_until(d(2026, 2, 1), d(2026, 1, 1)), 0);
        assert_eq!(months_until(d(2026, 1, 1), d(2026, 1, 20)), 1);
        assert_eq!(months_until(d(2026, 1, 31), d(2026, 2, 1)), 1);
    }
}
