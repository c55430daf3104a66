//! Day-boundary arithmetic for scheduling windows.
//!
//! Instants are kept in UTC; "local" always means the user's fixed offset.
//! Times of day are handled as minutes after local midnight so that a
//! phase ending at "24:00" stays representable.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Minutes in a calendar day.
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// A half-open scheduling window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window, rejecting an end before the start.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::InvalidTimeRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Window covering a whole local calendar day, ending at 23:59:59.999.
    pub fn whole_day(date: NaiveDate, tz: &FixedOffset) -> Self {
        Self {
            start: start_of_day(date, tz),
            end: end_of_day(date, tz),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Local calendar days touched by the window, in order.
    pub fn days(&self, tz: &FixedOffset) -> Vec<NaiveDate> {
        let first = local_date(self.start, tz);
        let last = if self.end > self.start {
            local_date(self.end - Duration::nanoseconds(1), tz)
        } else {
            first
        };
        first.iter_days().take_while(|d| *d <= last).collect()
    }
}

/// Convert a naive local datetime to UTC under a fixed offset.
pub fn local_to_utc(naive: NaiveDateTime, tz: &FixedOffset) -> DateTime<Utc> {
    Utc.from_utc_datetime(&(naive - Duration::seconds(i64::from(tz.local_minus_utc()))))
}

/// The local calendar date an instant falls on.
pub fn local_date(instant: DateTime<Utc>, tz: &FixedOffset) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

/// Local midnight at the start of `date`.
pub fn start_of_day(date: NaiveDate, tz: &FixedOffset) -> DateTime<Utc> {
    local_to_utc(date.and_time(chrono::NaiveTime::MIN), tz)
}

/// Last millisecond (23:59:59.999) of `date`.
pub fn end_of_day(date: NaiveDate, tz: &FixedOffset) -> DateTime<Utc> {
    start_of_day(date, tz) + Duration::days(1) - Duration::milliseconds(1)
}

/// Start of the calendar day containing `instant`.
pub fn start_of_day_containing(instant: DateTime<Utc>, tz: &FixedOffset) -> DateTime<Utc> {
    start_of_day(local_date(instant, tz), tz)
}

/// Sunday 00:00 local of the week containing `instant`.
pub fn start_of_week(instant: DateTime<Utc>, tz: &FixedOffset) -> DateTime<Utc> {
    let date = local_date(instant, tz);
    let back = i64::from(date.weekday().num_days_from_sunday());
    start_of_day(date - Duration::days(back), tz)
}

/// `minutes` after local midnight of `date`. 1440 lands on the next midnight.
pub fn at_minutes(date: NaiveDate, minutes: u32, tz: &FixedOffset) -> DateTime<Utc> {
    start_of_day(date, tz) + Duration::minutes(i64::from(minutes))
}

/// Whole local calendar days from `from` to `to` (0 on the same day).
pub fn calendar_days_between(from: DateTime<Utc>, to: DateTime<Utc>, tz: &FixedOffset) -> i64 {
    (local_date(to, tz) - local_date(from, tz)).num_days()
}

/// Weekday index with Sunday = 0 ... Saturday = 6.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Parse a local "HH:MM" into minutes after midnight. "24:00" is accepted.
pub fn parse_hhmm(value: &str) -> Result<u32, ValidationError> {
    let invalid = || ValidationError::InvalidTimeOfDay(value.to_string());

    let (h, m) = value.trim().split_once(':').ok_or_else(invalid)?;
    let hour: u32 = h.parse().map_err(|_| invalid())?;
    let minute: u32 = m.parse().map_err(|_| invalid())?;

    if minute >= 60 || hour > 24 || (hour == 24 && minute != 0) {
        return Err(invalid());
    }
    Ok(hour * 60 + minute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn tokyo() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parse_hhmm_accepts_valid_times() {
        assert_eq!(parse_hhmm("00:00").unwrap(), 0);
        assert_eq!(parse_hhmm("07:30").unwrap(), 450);
        assert_eq!(parse_hhmm(" 23:59 ").unwrap(), 1439);
        assert_eq!(parse_hhmm("24:00").unwrap(), MINUTES_PER_DAY);
    }

    #[test]
    fn parse_hhmm_rejects_garbage() {
        assert!(parse_hhmm("7").is_err());
        assert!(parse_hhmm("25:00").is_err());
        assert!(parse_hhmm("24:30").is_err());
        assert!(parse_hhmm("10:60").is_err());
        assert!(parse_hhmm("ab:cd").is_err());
    }

    #[test]
    fn day_boundaries_respect_offset() {
        let start = start_of_day(date(2026, 3, 10), &tokyo());
        // Tokyo midnight is 15:00 UTC the previous day.
        assert_eq!(start.hour(), 15);
        assert_eq!(start.day(), 9);

        let end = end_of_day(date(2026, 3, 10), &utc());
        assert_eq!((end.hour(), end.minute(), end.second()), (23, 59, 59));
        assert_eq!(end.timestamp_subsec_millis(), 999);
    }

    #[test]
    fn week_starts_on_sunday() {
        // 2026-03-11 is a Wednesday.
        let wed = at_minutes(date(2026, 3, 11), 14 * 60, &utc());
        assert_eq!(start_of_week(wed, &utc()), start_of_day(date(2026, 3, 8), &utc()));

        let sunday = at_minutes(date(2026, 3, 8), 0, &utc());
        assert_eq!(start_of_week(sunday, &utc()), sunday);
    }

    #[test]
    fn window_days_cover_partial_days() {
        let tz = utc();
        let window = TimeWindow::new(
            at_minutes(date(2026, 3, 10), 14 * 60, &tz),
            end_of_day(date(2026, 3, 11), &tz),
        )
        .unwrap();
        assert_eq!(window.days(&tz), vec![date(2026, 3, 10), date(2026, 3, 11)]);

        let single = TimeWindow::whole_day(date(2026, 3, 10), &tz);
        assert_eq!(single.days(&tz), vec![date(2026, 3, 10)]);
    }

    #[test]
    fn inverted_window_is_rejected() {
        let tz = utc();
        let a = at_minutes(date(2026, 3, 10), 600, &tz);
        let b = at_minutes(date(2026, 3, 10), 500, &tz);
        assert!(TimeWindow::new(a, b).is_err());
    }

    #[test]
    fn calendar_days_between_counts_midnights() {
        let tz = utc();
        let a = at_minutes(date(2026, 3, 10), 23 * 60, &tz);
        let b = at_minutes(date(2026, 3, 11), 60, &tz);
        assert_eq!(calendar_days_between(a, b, &tz), 1);
        assert_eq!(calendar_days_between(a, a, &tz), 0);
        assert_eq!(weekday_index(date(2026, 3, 8)), 0);
        assert_eq!(weekday_index(date(2026, 3, 14)), 6);
    }
}
