use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Counts days to expiry between two dates.
pub trait DayCount: Send + Sync {
    fn days_between(&self, from: NaiveDate, to: NaiveDate) -> i64;
}

/// Plain calendar days.
pub struct CalendarDays;

impl DayCount for CalendarDays {
    fn days_between(&self, from: NaiveDate, to: NaiveDate) -> i64 {
        (to - from).num_days()
    }
}

/// Business days approximated as calendar days x 5/7, truncated toward zero.
pub struct FiveSevenths;

impl DayCount for FiveSevenths {
    fn days_between(&self, from: NaiveDate, to: NaiveDate) -> i64 {
        (to - from).num_days() * 5 / 7
    }
}

/// Monday to Friday count in (from, to]. No holiday calendar.
pub struct Weekdays;

impl DayCount for Weekdays {
    fn days_between(&self, from: NaiveDate, to: NaiveDate) -> i64 {
        if to == from {
            return 0;
        }
        if to < from {
            return -Weekdays.days_between(to, from);
        }
        let total = (to - from).num_days();
        let full_weeks = total / 7;
        let mut count = full_weeks * 5;
        let mut day = from + chrono::Duration::days(full_weeks * 7);
        while day < to {
            day = day + chrono::Duration::days(1);
            if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                count += 1;
            }
        }
        count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayCountKind {
    Calendar,
    FiveSevenths,
    Weekdays,
}

impl DayCountKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "calendar" => Some(DayCountKind::Calendar),
            "five_sevenths" | "5/7" => Some(DayCountKind::FiveSevenths),
            "weekdays" => Some(DayCountKind::Weekdays),
            _ => None,
        }
    }

    pub fn strategy(&self) -> Box<dyn DayCount> {
        match self {
            DayCountKind::Calendar => Box::new(CalendarDays),
            DayCountKind::FiveSevenths => Box::new(FiveSevenths),
            DayCountKind::Weekdays => Box::new(Weekdays),
        }
    }
}

impl fmt::Display for DayCountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayCountKind::Calendar => write!(f, "calendar"),
            DayCountKind::FiveSevenths => write!(f, "five_sevenths"),
            DayCountKind::Weekdays => write!(f, "weekdays"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::date;

    #[test]
    fn five_sevenths_truncates() {
        // 10 calendar days -> 50/7 = 7.14 -> 7
        assert_eq!(FiveSevenths.days_between(date(2024, 3, 1), date(2024, 3, 11)), 7);
        assert_eq!(FiveSevenths.days_between(date(2024, 3, 1), date(2024, 3, 2)), 0);
        assert_eq!(CalendarDays.days_between(date(2024, 3, 1), date(2024, 3, 11)), 10);
    }

    #[test]
    fn weekdays_skip_weekends() {
        // Fri 2024-03-01 -> Mon 2024-03-04: only Monday counts
        assert_eq!(Weekdays.days_between(date(2024, 3, 1), date(2024, 3, 4)), 1);
        // two full weeks
        assert_eq!(Weekdays.days_between(date(2024, 3, 4), date(2024, 3, 18)), 10);
        assert_eq!(Weekdays.days_between(date(2024, 3, 4), date(2024, 3, 1)), -1);
    }

    #[test]
    fn kind_parses() {
        assert_eq!(DayCountKind::parse("5/7"), Some(DayCountKind::FiveSevenths));
        assert_eq!(DayCountKind::parse("Calendar"), Some(DayCountKind::Calendar));
        assert_eq!(DayCountKind::parse("lunar"), None);
    }
}
