//! UTC calendar arithmetic for monthly windows and daily sleeps.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

/// An inclusive `[start, end]` range of instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    #[must_use]
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The calendar month `year-month` in UTC, from its first instant to the
    /// last nanosecond before the next month begins.
    ///
    /// Returns `None` when `month` is not in `1..=12`.
    #[must_use]
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = first_of_month(year, month)?;
        let (next_year, next_month) = next_month(year, month);
        let next = first_of_month(next_year, next_month)?;
        Some(Self {
            start,
            end: next - Duration::nanoseconds(1),
        })
    }

    /// A window that starts at `start` and never ends.
    #[must_use]
    pub fn open_ended(start: DateTime<Utc>) -> Self {
        Self {
            start,
            end: DateTime::<Utc>::MAX_UTC,
        }
    }

    /// Both bounds are inclusive.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

fn first_of_month(year: i32, month: u32) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// `(year, month)` of the calendar month before the one containing `now`.
#[must_use]
pub fn previous_month(now: DateTime<Utc>) -> (i32, u32) {
    if now.month() == 1 {
        (now.year() - 1, 12)
    } else {
        (now.year(), now.month() - 1)
    }
}

/// A month is complete once the calendar has moved on to the following month.
#[must_use]
pub fn completes_month(year: i32, month: u32, now: DateTime<Utc>) -> bool {
    previous_month(now) == (year, month)
}

/// Midnight UTC at the start of the day containing `now`.
#[must_use]
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    midnight(now.date_naive())
}

/// Midnight UTC at the start of the day after `now`.
#[must_use]
pub fn start_of_next_day(now: DateTime<Utc>) -> DateTime<Utc> {
    match now.date_naive().succ_opt() {
        Some(tomorrow) => midnight(tomorrow),
        None => DateTime::<Utc>::MAX_UTC,
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn month_window_covers_whole_month_inclusive() {
        let window = TimeWindow::month(2024, 2).unwrap();

        assert_eq!(window.start, at(2024, 2, 1, 0, 0, 0));
        assert!(window.contains(at(2024, 2, 29, 23, 59, 59)));
        assert!(window.contains(window.start));
        assert!(window.contains(window.end));
        assert!(!window.contains(at(2024, 3, 1, 0, 0, 0)));
        assert!(!window.contains(at(2024, 1, 31, 23, 59, 59)));
    }

    #[test]
    fn december_window_ends_before_new_year() {
        let window = TimeWindow::month(2023, 12).unwrap();
        assert_eq!(window.end + Duration::nanoseconds(1), at(2024, 1, 1, 0, 0, 0));
    }

    #[test]
    fn month_rejects_out_of_range() {
        assert!(TimeWindow::month(2024, 0).is_none());
        assert!(TimeWindow::month(2024, 13).is_none());
    }

    #[test]
    fn open_ended_window_accepts_future() {
        let window = TimeWindow::open_ended(at(2024, 5, 1, 0, 0, 0));
        assert!(window.contains(at(2099, 1, 1, 0, 0, 0)));
        assert!(!window.contains(at(2024, 4, 30, 0, 0, 0)));
    }

    #[test]
    fn previous_month_wraps_january() {
        assert_eq!(previous_month(at(2025, 1, 15, 8, 0, 0)), (2024, 12));
        assert_eq!(previous_month(at(2025, 7, 1, 0, 0, 0)), (2025, 6));
    }

    #[test]
    fn completes_month_only_for_the_month_just_ended() {
        let now = at(2025, 3, 2, 12, 0, 0);
        assert!(completes_month(2025, 2, now));
        assert!(!completes_month(2025, 3, now));
        assert!(!completes_month(2025, 1, now));
        assert!(!completes_month(2024, 2, now));

        assert!(completes_month(2024, 12, at(2025, 1, 1, 0, 0, 0)));
    }

    #[test]
    fn day_boundaries() {
        let now = at(2024, 12, 31, 17, 45, 3);
        assert_eq!(start_of_day(now), at(2024, 12, 31, 0, 0, 0));
        assert_eq!(start_of_next_day(now), at(2025, 1, 1, 0, 0, 0));
    }
}
