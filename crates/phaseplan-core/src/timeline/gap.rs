//! Free-slot detection between busy intervals.
//!
//! Finds open time between obligations and tags each slot with the phase
//! active at its midpoint.

use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schedule::{BusyInterval, Phase};
use crate::sources::PhaseSource;
use crate::time_window::{local_date, TimeWindow};

/// Slots shorter than this are never reported.
pub const MIN_SLOT_MINUTES: i64 = 5;

/// A maximal open interval inside a scheduling window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FreeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_minutes: i64,
    pub phase: Option<Phase>,
}

impl FreeSlot {
    /// A slot over `[start, end)` tagged with the phase at its midpoint.
    pub fn tagged(start: DateTime<Utc>, end: DateTime<Utc>, phases: &PhaseCalendar) -> Self {
        Self {
            start,
            end,
            duration_minutes: (end - start).num_minutes(),
            phase: phases.phase_at(midpoint(start, end)).cloned(),
        }
    }

    pub fn midpoint(&self) -> DateTime<Utc> {
        midpoint(self.start, self.end)
    }

    /// Check if this slot can fit a chunk of given duration
    pub fn can_fit(&self, minutes: i64) -> bool {
        self.duration_minutes >= minutes
    }
}

fn midpoint(start: DateTime<Utc>, end: DateTime<Utc>) -> DateTime<Utc> {
    start + (end - start) / 2
}

/// Phases for every day of a window, fetched once per run.
#[derive(Debug, Clone)]
pub struct PhaseCalendar {
    tz: FixedOffset,
    days: HashMap<NaiveDate, Vec<Phase>>,
}

impl PhaseCalendar {
    /// A calendar with no phases; every slot scores neutrally.
    pub fn empty(tz: FixedOffset) -> Self {
        Self {
            tz,
            days: HashMap::new(),
        }
    }

    pub fn insert(&mut self, date: NaiveDate, phases: Vec<Phase>) {
        self.days.insert(date, phases);
    }

    /// Fetch phases for each calendar day of `window`.
    pub async fn load(source: &dyn PhaseSource, window: &TimeWindow, tz: FixedOffset) -> Result<Self> {
        let mut calendar = Self::empty(tz);
        for date in window.days(&tz) {
            let phases = source.phases_for_date(date).await?;
            if phases.is_empty() {
                tracing::debug!(%date, "no phases for day");
            }
            calendar.insert(date, phases);
        }
        Ok(calendar)
    }

    /// The phase covering `instant` on its own local day, if any.
    pub fn phase_at(&self, instant: DateTime<Utc>) -> Option<&Phase> {
        self.days
            .get(&local_date(instant, &self.tz))?
            .iter()
            .find(|p| p.covers(instant))
    }
}

/// Sweeps sorted busy intervals to find free slots.
#[derive(Debug, Clone)]
pub struct FreeSlotFinder {
    min_slot: Duration,
}

impl FreeSlotFinder {
    /// Create a finder with the default 5 minute floor
    pub fn new() -> Self {
        Self {
            min_slot: Duration::minutes(MIN_SLOT_MINUTES),
        }
    }

    /// Set the minimum slot duration
    pub fn with_min_slot(mut self, minutes: i64) -> Self {
        self.min_slot = Duration::minutes(minutes.max(1));
        self
    }

    /// Free slots of `window` not covered by `busy`.
    ///
    /// `busy` must be sorted by start; overlapping intervals are fine since
    /// the cursor only moves forward.
    pub fn find_slots(
        &self,
        busy: &[BusyInterval],
        window: &TimeWindow,
        phases: &PhaseCalendar,
    ) -> Vec<FreeSlot> {
        let mut slots = Vec::new();
        let mut cursor = window.start;

        for interval in busy {
            if interval.end <= window.start || interval.start >= window.end {
                continue;
            }
            if interval.start > cursor {
                self.push_slot(&mut slots, cursor, interval.start.min(window.end), phases);
            }
            cursor = cursor.max(interval.end);
        }

        if cursor < window.end {
            self.push_slot(&mut slots, cursor, window.end, phases);
        }

        slots
    }

    fn push_slot(
        &self,
        slots: &mut Vec<FreeSlot>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        phases: &PhaseCalendar,
    ) {
        if end - start < self.min_slot {
            return;
        }
        slots.push(FreeSlot::tagged(start, end, phases));
    }
}

impl Default for FreeSlotFinder {
    fn default() -> Self {
        Self::new()
    }
}
