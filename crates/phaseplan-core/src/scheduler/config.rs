//! Tunables for the scheduling engine.

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

/// Priority scoring configuration.
///
/// Tier bases are spaced further apart than `age_bonus_cap`, so task age
/// never lifts a task over a more urgent tier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriorityConfig {
    #[serde(default = "default_critical_base")]
    pub critical_base: u32,
    #[serde(default = "default_high_base")]
    pub high_base: u32,
    #[serde(default = "default_medium_base")]
    pub medium_base: u32,
    #[serde(default = "default_low_base")]
    pub low_base: u32,
    /// Maximum bonus, one point per day since creation
    #[serde(default = "default_age_bonus_cap")]
    pub age_bonus_cap: u32,
    /// Fixed score of every habit instance
    #[serde(default = "default_habit_baseline")]
    pub habit_baseline: u32,
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchedulerConfig {
    /// Upper bound on tasks fetched per run
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,
    /// Free gaps shorter than this are ignored (minutes)
    #[serde(default = "default_min_slot_minutes")]
    pub min_slot_minutes: i64,
    #[serde(default = "default_task_min_chunk")]
    pub task_min_chunk_minutes: u32,
    #[serde(default = "default_task_max_chunk")]
    pub task_max_chunk_minutes: u32,
    /// Floor for a habit session length
    #[serde(default = "default_habit_min_session")]
    pub habit_min_session_minutes: u32,
    /// Score subtracted per calendar day after the window start
    #[serde(default = "default_earliness_penalty")]
    pub earliness_penalty_per_day: f64,
    /// Hard stop on bookings for a single item within one run
    #[serde(default = "default_max_bookings_per_item")]
    pub max_bookings_per_item: usize,
    /// User's offset from UTC in minutes; UTC when unset
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
    #[serde(default)]
    pub priority: PriorityConfig,
}

fn default_critical_base() -> u32 {
    400
}
fn default_high_base() -> u32 {
    300
}
fn default_medium_base() -> u32 {
    200
}
fn default_low_base() -> u32 {
    100
}
fn default_age_bonus_cap() -> u32 {
    30
}
fn default_habit_baseline() -> u32 {
    350
}
fn default_candidate_limit() -> usize {
    50
}
fn default_min_slot_minutes() -> i64 {
    5
}
fn default_task_min_chunk() -> u32 {
    15
}
fn default_task_max_chunk() -> u32 {
    60
}
fn default_habit_min_session() -> u32 {
    15
}
fn default_earliness_penalty() -> f64 {
    0.1
}
fn default_max_bookings_per_item() -> usize {
    48
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            critical_base: default_critical_base(),
            high_base: default_high_base(),
            medium_base: default_medium_base(),
            low_base: default_low_base(),
            age_bonus_cap: default_age_bonus_cap(),
            habit_baseline: default_habit_baseline(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            candidate_limit: default_candidate_limit(),
            min_slot_minutes: default_min_slot_minutes(),
            task_min_chunk_minutes: default_task_min_chunk(),
            task_max_chunk_minutes: default_task_max_chunk(),
            habit_min_session_minutes: default_habit_min_session(),
            earliness_penalty_per_day: default_earliness_penalty(),
            max_bookings_per_item: default_max_bookings_per_item(),
            utc_offset_minutes: None,
            priority: PriorityConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// The user's fixed offset. Out-of-range offsets fall back to UTC.
    pub fn time_zone(&self) -> FixedOffset {
        self.utc_offset_minutes
            .and_then(|m| FixedOffset::east_opt(m * 60))
            .unwrap_or_else(|| Utc.fix())
    }

    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset_minutes = Some(offset.local_minus_utc() / 60);
        self
    }
}
