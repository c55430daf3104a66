//! Obligation collection.
//!
//! Gathers everything that blocks personal scheduling for a window:
//! appointments, anchors, sleep and work hours. Profile gaps and malformed
//! times drop the affected block instead of failing the run.

use chrono::{Duration, FixedOffset, NaiveDate};

use crate::error::Result;
use crate::schedule::{BusyInterval, BusyKind, UserProfile};
use crate::sources::ObligationSource;
use crate::time_window::{at_minutes, parse_hhmm, start_of_day, TimeWindow};

/// Parse an optional "HH:MM", logging and discarding malformed values.
fn profile_minutes(field: &str, value: Option<&str>) -> Option<u32> {
    let value = value?;
    match parse_hhmm(value) {
        Ok(minutes) => Some(minutes),
        Err(e) => {
            tracing::warn!(field, error = %e, "ignoring profile time");
            None
        }
    }
}

/// Sleep blocks for `date`.
///
/// Sleep crossing midnight (start after end) yields `[midnight, end]` and
/// `[start, next midnight]`; otherwise a single `[start, end]`.
pub fn sleep_intervals(profile: &UserProfile, date: NaiveDate, tz: &FixedOffset) -> Vec<BusyInterval> {
    let start = profile_minutes("sleep_start", profile.sleep_start.as_deref());
    let end = profile_minutes("sleep_end", profile.sleep_end.as_deref());
    let (Some(start), Some(end)) = (start, end) else {
        return Vec::new();
    };

    if start > end {
        let midnight = start_of_day(date, tz);
        vec![
            BusyInterval::new(midnight, at_minutes(date, end, tz), BusyKind::Sleep),
            BusyInterval::new(
                at_minutes(date, start, tz),
                midnight + Duration::days(1),
                BusyKind::Sleep,
            ),
        ]
    } else if start < end {
        vec![BusyInterval::new(
            at_minutes(date, start, tz),
            at_minutes(date, end, tz),
            BusyKind::Sleep,
        )]
    } else {
        tracing::warn!(%date, "sleep start equals sleep end, no sleep block");
        Vec::new()
    }
}

/// Work block for `date`, omitted when work end is not after work start.
pub fn work_interval(profile: &UserProfile, date: NaiveDate, tz: &FixedOffset) -> Option<BusyInterval> {
    let start = profile_minutes("work_start", profile.work_start.as_deref())?;
    let end = profile_minutes("work_end", profile.work_end.as_deref())?;
    if end <= start {
        tracing::warn!(%date, "work end is not after work start, no work block");
        return None;
    }
    Some(BusyInterval::new(
        at_minutes(date, start, tz),
        at_minutes(date, end, tz),
        BusyKind::Work,
    ))
}

/// Collect every busy interval touching `window`, sorted by start.
///
/// Overlaps are kept; the free-slot sweep absorbs them.
pub async fn collect_obligations(
    source: &dyn ObligationSource,
    user_id: &str,
    window: &TimeWindow,
    tz: &FixedOffset,
) -> Result<Vec<BusyInterval>> {
    let profile = source.profile(user_id).await?;
    let mut busy = Vec::new();

    for date in window.days(tz) {
        busy.extend(source.appointments(user_id, date).await?);
        busy.extend(source.anchors(user_id, date).await?);
        busy.extend(sleep_intervals(&profile, date, tz));
        busy.extend(work_interval(&profile, date, tz));
    }

    busy.retain(|b| {
        let valid = b.end >= b.start;
        if !valid {
            tracing::warn!(start = %b.start, end = %b.end, "dropping inverted busy interval");
        }
        valid
    });
    busy.sort_by_key(|b| b.start);
    Ok(busy)
}
