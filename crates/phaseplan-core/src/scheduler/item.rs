//! The scheduler's uniform unit of work.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::schedule::{PlanSourceKind, WeekdaySet};

/// What a schedulable item was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    Task,
    /// One day's instance of a habit.
    HabitInstance { day: NaiveDate },
}

/// A task or habit-day awaiting placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulableItem {
    pub kind: ItemKind,
    pub source_id: String,
    pub title: String,
    /// Higher schedules first.
    pub priority_score: u32,
    /// Decremented as chunks are booked.
    pub remaining_minutes: u32,
    pub min_chunk_minutes: u32,
    pub max_chunk_minutes: u32,
    pub allowed_days: WeekdaySet,
    pub ideal_phase: Option<String>,
    pub keywords: Vec<String>,
}

impl SchedulableItem {
    pub fn source_kind(&self) -> PlanSourceKind {
        match self.kind {
            ItemKind::Task => PlanSourceKind::Task,
            ItemKind::HabitInstance { .. } => PlanSourceKind::Habit,
        }
    }

    pub fn day(&self) -> Option<NaiveDate> {
        match self.kind {
            ItemKind::Task => None,
            ItemKind::HabitInstance { day } => Some(day),
        }
    }

    /// Whether another booking should be attempted. A leftover at or below
    /// the minimum chunk is not worth a slot of its own.
    pub fn wants_more(&self) -> bool {
        self.remaining_minutes > self.min_chunk_minutes
    }

    /// Size of the next booking in a slot of `slot_minutes`.
    pub fn chunk_for(&self, slot_minutes: u32) -> u32 {
        self.remaining_minutes
            .min(self.max_chunk_minutes)
            .min(slot_minutes)
    }
}

/// Where an item ended up after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Nothing booked.
    Pending,
    /// Some minutes booked, some left for a later run.
    PartiallyBooked,
    FullyBooked,
}

impl ItemStatus {
    pub fn from_minutes(booked: u32, remaining: u32) -> Self {
        if booked == 0 {
            ItemStatus::Pending
        } else if remaining == 0 {
            ItemStatus::FullyBooked
        } else {
            ItemStatus::PartiallyBooked
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(remaining: u32) -> SchedulableItem {
        SchedulableItem {
            kind: ItemKind::Task,
            source_id: "t".into(),
            title: "t".into(),
            priority_score: 0,
            remaining_minutes: remaining,
            min_chunk_minutes: 15,
            max_chunk_minutes: 60,
            allowed_days: WeekdaySet::ALL,
            ideal_phase: None,
            keywords: Vec::new(),
        }
    }

    #[test]
    fn chunk_is_capped_by_item_and_slot() {
        assert_eq!(item(90).chunk_for(240), 60);
        assert_eq!(item(90).chunk_for(25), 25);
        assert_eq!(item(10).chunk_for(240), 10);
    }

    #[test]
    fn small_leftover_stops_booking() {
        assert!(item(30).wants_more());
        assert!(!item(15).wants_more());
        assert!(!item(0).wants_more());
    }

    #[test]
    fn status_reflects_bookings() {
        assert_eq!(ItemStatus::from_minutes(0, 30), ItemStatus::Pending);
        assert_eq!(ItemStatus::from_minutes(60, 30), ItemStatus::PartiallyBooked);
        assert_eq!(ItemStatus::from_minutes(90, 0), ItemStatus::FullyBooked);
    }
}
