//! Greedy best-fit allocation of one item at a time.
//!
//! An `Allocator` lives for exactly one scheduling run and owns that run's
//! busy set. Every booking is inserted back into the set, so later items
//! only ever see what earlier ones left over.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use super::config::SchedulerConfig;
use super::item::SchedulableItem;
use super::suitability::suitability;
use crate::error::Result;
use crate::schedule::{BusyInterval, BusyKind, NewPlan, PlanId, WeekdaySet};
use crate::sources::PlanSink;
use crate::time_window::{calendar_days_between, local_date, start_of_day, TimeWindow};
use crate::timeline::{FreeSlot, FreeSlotFinder, PhaseCalendar};

/// One chunk booked for an item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub plan_id: PlanId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub minutes: u32,
    pub phase: Option<String>,
}

pub struct Allocator<'a> {
    user_id: &'a str,
    window: TimeWindow,
    tz: FixedOffset,
    busy: Vec<BusyInterval>,
    phases: PhaseCalendar,
    finder: FreeSlotFinder,
    sink: &'a dyn PlanSink,
    earliness_penalty: f64,
    max_bookings: usize,
}

impl<'a> Allocator<'a> {
    /// `busy` must be sorted by start, as `collect_obligations` returns it.
    pub fn new(
        user_id: &'a str,
        window: TimeWindow,
        busy: Vec<BusyInterval>,
        phases: PhaseCalendar,
        sink: &'a dyn PlanSink,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            user_id,
            window,
            tz: config.time_zone(),
            busy,
            phases,
            finder: FreeSlotFinder::new().with_min_slot(config.min_slot_minutes),
            sink,
            earliness_penalty: config.earliness_penalty_per_day,
            max_bookings: config.max_bookings_per_item.max(1),
        }
    }

    /// Current busy set, sorted by start.
    pub fn busy(&self) -> &[BusyInterval] {
        &self.busy
    }

    /// Free slots for the current busy state.
    pub fn free_slots(&self) -> Vec<FreeSlot> {
        self.finder.find_slots(&self.busy, &self.window, &self.phases)
    }

    /// Slot score: suitability minus a small penalty per day of delay.
    pub fn score(&self, item: &SchedulableItem, slot: &FreeSlot) -> f64 {
        let days = calendar_days_between(self.window.start, slot.start, &self.tz).max(0);
        suitability(item, slot.phase.as_ref()) - self.earliness_penalty * days as f64
    }

    /// Highest-scoring slot the item may use. Ties go to the earliest slot.
    pub fn best_slot(&self, item: &SchedulableItem, slots: &[FreeSlot]) -> Option<FreeSlot> {
        let mut best: Option<(f64, FreeSlot)> = None;
        for slot in slots {
            for part in self.usable_parts(item, slot) {
                if !part.can_fit(i64::from(item.min_chunk_minutes)) {
                    continue;
                }
                let score = self.score(item, &part);
                if best.as_ref().map_or(true, |(top, _)| score > *top) {
                    best = Some((score, part));
                }
            }
        }
        best.map(|(_, slot)| slot)
    }

    /// The parts of `slot` an item may book into.
    ///
    /// A day-locked item only sees the pieces of a slot that fall on its
    /// allowed local days, each clipped at midnight and tagged with the
    /// phase at its own midpoint.
    fn usable_parts(&self, item: &SchedulableItem, slot: &FreeSlot) -> Vec<FreeSlot> {
        if item.allowed_days == WeekdaySet::ALL {
            return vec![slot.clone()];
        }

        let mut parts = Vec::new();
        let mut start = slot.start;
        while start < slot.end {
            let day = local_date(start, &self.tz);
            let end = slot.end.min(start_of_day(day + Duration::days(1), &self.tz));
            if item.allowed_days.contains_date(day) {
                parts.push(FreeSlot::tagged(start, end, &self.phases));
            }
            start = end;
        }
        parts
    }

    /// Book chunks for `item` until it is exhausted or no slot fits.
    ///
    /// Decrements `item.remaining_minutes` as it goes. Running out of room
    /// is not an error; the item just keeps what it got.
    pub async fn allocate(&mut self, item: &mut SchedulableItem) -> Result<Vec<Booking>> {
        let mut bookings = Vec::new();

        while bookings.len() < self.max_bookings && item.remaining_minutes > 0 {
            let slots = self.free_slots();
            let Some(slot) = self.best_slot(item, &slots) else {
                tracing::debug!(item = %item.source_id, remaining = item.remaining_minutes, "no slot fits");
                break;
            };

            let minutes = item.chunk_for(u32::try_from(slot.duration_minutes).unwrap_or(u32::MAX));
            if minutes == 0 {
                break;
            }

            let start = slot.start;
            let end = start + Duration::minutes(i64::from(minutes));
            let phase = slot.phase.as_ref().map(|p| p.name.clone());
            let part = bookings.len() + 1;

            let plan = NewPlan {
                title: item.title.clone(),
                start_time: start,
                end_time: end,
                source_id: item.source_id.clone(),
                source_kind: item.source_kind(),
                note: plan_note(phase.as_deref(), part),
            };
            let plan_id = self.sink.create_plan(self.user_id, plan).await?;
            tracing::debug!(item = %item.source_id, %start, minutes, plan = %plan_id, "booked");

            self.insert_busy(BusyInterval::new(start, end, BusyKind::Booked));
            item.remaining_minutes -= minutes;
            bookings.push(Booking {
                plan_id,
                start,
                end,
                minutes,
                phase,
            });

            if !item.wants_more() {
                break;
            }
        }

        Ok(bookings)
    }

    fn insert_busy(&mut self, interval: BusyInterval) {
        let at = self.busy.partition_point(|b| b.start <= interval.start);
        self.busy.insert(at, interval);
    }
}

fn plan_note(phase: Option<&str>, part: usize) -> Option<String> {
    match (phase, part) {
        (Some(phase), 1) => Some(phase.to_string()),
        (Some(phase), n) => Some(format!("{phase} · part {n}")),
        (None, 1) => None,
        (None, n) => Some(format!("part {n}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Phase;
    use crate::scheduler::item::ItemKind;
    use crate::sources::MemoryStore;
    use crate::time_window::{at_minutes, end_of_day};
    use chrono::{NaiveDate, Timelike, Weekday};

    fn tz() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    fn at(d: NaiveDate, h: u32) -> DateTime<Utc> {
        at_minutes(d, h * 60, &tz())
    }

    fn task(minutes: u32, keywords: &[&str]) -> SchedulableItem {
        SchedulableItem {
            kind: ItemKind::Task,
            source_id: "t".into(),
            title: "Task".into(),
            priority_score: 200,
            remaining_minutes: minutes,
            min_chunk_minutes: 15,
            max_chunk_minutes: 60,
            allowed_days: WeekdaySet::ALL,
            ideal_phase: None,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn phase(name: &str, from: DateTime<Utc>, to: DateTime<Utc>, keywords: &[&str]) -> Phase {
        Phase {
            name: name.into(),
            start: from,
            end: to,
            ideal_task_keywords: keywords.iter().map(|k| k.to_string()).collect(),
            color: None,
        }
    }

    #[tokio::test]
    async fn splits_long_item_into_max_chunks() {
        let store = MemoryStore::new(tz());
        let cfg = SchedulerConfig::default();
        let window = TimeWindow::new(at(day(), 8), at(day(), 18)).unwrap();
        let mut alloc = Allocator::new("u", window, Vec::new(), PhaseCalendar::empty(tz()), &store, &cfg);

        let mut item = task(150, &[]);
        let bookings = alloc.allocate(&mut item).await.unwrap();

        let minutes: Vec<u32> = bookings.iter().map(|b| b.minutes).collect();
        assert_eq!(minutes, vec![60, 60, 30]);
        assert_eq!(item.remaining_minutes, 0);
        assert_eq!(store.plans("u").len(), 3);
        assert_eq!(store.plans("u")[1].note.as_deref(), Some("part 2"));
        assert_eq!(alloc.busy().len(), 3);
    }

    #[tokio::test]
    async fn prefers_matching_phase_over_earliest_slot() {
        let store = MemoryStore::new(tz());
        let cfg = SchedulerConfig::default();
        let mut phases = PhaseCalendar::empty(tz());
        phases.insert(
            day(),
            vec![
                phase("Morning", at(day(), 8), at(day(), 12), &["admin"]),
                phase("Afternoon", at(day(), 12), at(day(), 18), &["writing"]),
            ],
        );
        let window = TimeWindow::new(at(day(), 8), at(day(), 18)).unwrap();
        let lunch = BusyInterval::new(at(day(), 12), at(day(), 12) + Duration::minutes(1), BusyKind::Anchor);
        let mut alloc = Allocator::new("u", window, vec![lunch], phases, &store, &cfg);

        let mut item = task(30, &["writing"]);
        let bookings = alloc.allocate(&mut item).await.unwrap();
        assert_eq!(bookings.len(), 1);
        assert!(bookings[0].start >= at(day(), 12));
        assert_eq!(bookings[0].phase.as_deref(), Some("Afternoon"));
    }

    #[tokio::test]
    async fn earliness_breaks_ties_across_days() {
        let store = MemoryStore::new(tz());
        let cfg = SchedulerConfig::default();
        let next = day().succ_opt().unwrap();
        let window = TimeWindow::new(at(day(), 20), end_of_day(next, &tz())).unwrap();
        // Today 20:00-21:00 is free, everything else before tomorrow 09:00 is busy.
        let busy = vec![BusyInterval::new(at(day(), 21), at(next, 9), BusyKind::Sleep)];
        let mut alloc = Allocator::new("u", window, busy, PhaseCalendar::empty(tz()), &store, &cfg);

        let mut item = task(30, &[]);
        let bookings = alloc.allocate(&mut item).await.unwrap();
        assert_eq!(bookings[0].start, at(day(), 20));
    }

    #[tokio::test]
    async fn suitability_outweighs_one_day_of_delay() {
        let store = MemoryStore::new(tz());
        let cfg = SchedulerConfig::default();
        let next = day().succ_opt().unwrap();
        let mut phases = PhaseCalendar::empty(tz());
        phases.insert(next, vec![phase("Dawn", at(next, 5), at(next, 8), &[])]);
        let window = TimeWindow::new(at(day(), 9), at(next, 8)).unwrap();
        let mut alloc = Allocator::new("u", window, Vec::new(), phases, &store, &cfg);

        let mut item = task(20, &[]);
        item.ideal_phase = Some("Dawn".into());
        // Split the window so tomorrow's dawn is its own slot.
        alloc.insert_busy(BusyInterval::new(at(next, 4), at(next, 5), BusyKind::Sleep));

        let slots = alloc.free_slots();
        assert_eq!(slots.len(), 2);
        assert!(alloc.score(&item, &slots[1]) > alloc.score(&item, &slots[0]));

        let bookings = alloc.allocate(&mut item).await.unwrap();
        assert_eq!(bookings[0].start, at(next, 5));
        assert_eq!(bookings[0].phase.as_deref(), Some("Dawn"));
    }

    #[tokio::test]
    async fn day_locked_item_ignores_other_days() {
        let store = MemoryStore::new(tz());
        let cfg = SchedulerConfig::default();
        let next = day().succ_opt().unwrap();
        let window = TimeWindow::new(at(day(), 8), end_of_day(next, &tz())).unwrap();
        let busy = vec![BusyInterval::new(at(day(), 18), at(next, 8), BusyKind::Sleep)];
        let mut alloc = Allocator::new("u", window, busy, PhaseCalendar::empty(tz()), &store, &cfg);

        let mut item = task(30, &[]);
        item.allowed_days = WeekdaySet::only_weekday(Weekday::Wed);
        let bookings = alloc.allocate(&mut item).await.unwrap();
        assert_eq!(local_date(bookings[0].start, &tz()), next);
        assert_eq!(bookings[0].start.hour(), 8);
    }

    #[tokio::test]
    async fn day_locked_item_uses_its_part_of_a_slot_crossing_midnight() {
        let store = MemoryStore::new(tz());
        let cfg = SchedulerConfig::default();
        let next = day().succ_opt().unwrap();
        let mut phases = PhaseCalendar::empty(tz());
        phases.insert(next, vec![phase("Night", at(next, 0), at(next, 5), &[])]);
        let window = TimeWindow::new(at(day(), 8), end_of_day(next, &tz())).unwrap();
        // One free slot from Tuesday 23:00 through Wednesday noon.
        let busy = vec![
            BusyInterval::new(at(day(), 8), at(day(), 23), BusyKind::Appointment),
            BusyInterval::new(at(next, 12), end_of_day(next, &tz()), BusyKind::Appointment),
        ];
        let alloc = Allocator::new("u", window, busy, phases, &store, &cfg);

        let mut tuesday_only = task(30, &[]);
        tuesday_only.allowed_days = WeekdaySet::only_weekday(Weekday::Tue);
        let slots = alloc.free_slots();
        assert_eq!(slots.len(), 1);
        let part = alloc.best_slot(&tuesday_only, &slots).unwrap();
        assert_eq!((part.start, part.end), (at(day(), 23), at(next, 0)));
        assert_eq!(part.duration_minutes, 60);
        assert!(part.phase.is_none());

        let mut wednesday_only = task(30, &[]);
        wednesday_only.allowed_days = WeekdaySet::only_weekday(Weekday::Wed);
        let part = alloc.best_slot(&wednesday_only, &slots).unwrap();
        assert_eq!((part.start, part.end), (at(next, 0), at(next, 12)));
        // Re-tagged at the clipped part's midpoint, not the whole slot's.
        assert!(part.phase.is_none());

        let mut alloc = alloc;
        let bookings = alloc.allocate(&mut wednesday_only).await.unwrap();
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].start, at(next, 0));
        assert_eq!(local_date(bookings[0].start, &tz()), next);
    }

    #[tokio::test]
    async fn clipped_part_takes_phase_at_its_own_midpoint() {
        let store = MemoryStore::new(tz());
        let cfg = SchedulerConfig::default();
        let next = day().succ_opt().unwrap();
        let mut phases = PhaseCalendar::empty(tz());
        phases.insert(day(), vec![phase("Late", at(day(), 20), at(next, 0), &[])]);
        let window = TimeWindow::new(at(day(), 20), end_of_day(next, &tz())).unwrap();
        let busy = vec![BusyInterval::new(at(next, 8), end_of_day(next, &tz()), BusyKind::Sleep)];
        let alloc = Allocator::new("u", window, busy, phases, &store, &cfg);

        let slots = alloc.free_slots();
        // Whole slot 20:00-08:00 has its midpoint at 02:00 with no phase.
        assert!(slots[0].phase.is_none());

        let mut item = task(30, &[]);
        item.allowed_days = WeekdaySet::only_weekday(Weekday::Tue);
        let part = alloc.best_slot(&item, &slots).unwrap();
        assert_eq!(part.phase.as_ref().map(|p| p.name.as_str()), Some("Late"));
    }

    #[tokio::test]
    async fn no_room_leaves_item_untouched() {
        let store = MemoryStore::new(tz());
        let cfg = SchedulerConfig::default();
        let window = TimeWindow::new(at(day(), 8), at(day(), 9)).unwrap();
        let busy = vec![BusyInterval::new(
            at(day(), 8) + Duration::minutes(10),
            at(day(), 9),
            BusyKind::Appointment,
        )];
        let mut alloc = Allocator::new("u", window, busy, PhaseCalendar::empty(tz()), &store, &cfg);

        let mut item = task(30, &[]);
        let bookings = alloc.allocate(&mut item).await.unwrap();
        assert!(bookings.is_empty());
        assert_eq!(item.remaining_minutes, 30);
        assert!(store.plans("u").is_empty());
    }

    #[tokio::test]
    async fn booking_cap_bounds_the_loop() {
        let store = MemoryStore::new(tz());
        let cfg = SchedulerConfig {
            max_bookings_per_item: 2,
            ..SchedulerConfig::default()
        };
        let window = TimeWindow::new(at(day(), 8), at(day(), 18)).unwrap();
        let mut alloc = Allocator::new("u", window, Vec::new(), PhaseCalendar::empty(tz()), &store, &cfg);

        let mut item = task(300, &[]);
        let bookings = alloc.allocate(&mut item).await.unwrap();
        assert_eq!(bookings.len(), 2);
        assert_eq!(item.remaining_minutes, 180);
    }
}
