//! Schedule types: tasks, habits, phases, obligations and plans.
//!
//! These are the shapes exchanged with the external collaborators. The
//! scheduler never persists them itself; it reads them through the
//! source traits and writes plans through the plan sink.

mod weekday;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub use weekday::WeekdaySet;

/// Identifier returned by a plan sink.
pub type PlanId = String;

/// Urgency tier of a task, T1 being the most urgent.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    #[serde(alias = "T1", alias = "t1")]
    Critical,
    #[serde(alias = "T2", alias = "t2")]
    High,
    #[serde(alias = "T3", alias = "t3")]
    #[default]
    Medium,
    #[serde(alias = "T4", alias = "t4")]
    Low,
}

impl UrgencyLevel {
    /// Tier number, 1 (critical) through 4 (low).
    pub fn tier(self) -> u8 {
        match self {
            UrgencyLevel::Critical => 1,
            UrgencyLevel::High => 2,
            UrgencyLevel::Medium => 3,
            UrgencyLevel::Low => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UrgencyLevel::Critical => "critical",
            UrgencyLevel::High => "high",
            UrgencyLevel::Medium => "medium",
            UrgencyLevel::Low => "low",
        }
    }
}

impl fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UrgencyLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" | "t1" => Ok(UrgencyLevel::Critical),
            "high" | "t2" => Ok(UrgencyLevel::High),
            "medium" | "t3" => Ok(UrgencyLevel::Medium),
            "low" | "t4" => Ok(UrgencyLevel::Low),
            other => Err(ValidationError::InvalidValue {
                field: "urgency".into(),
                message: format!("unknown urgency '{other}'"),
            }),
        }
    }
}

/// A one-off task awaiting placement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub effort_minutes: u32,
    #[serde(default)]
    pub urgency: UrgencyLevel,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// A recurring habit with a weekly minute goal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Habit {
    pub id: String,
    pub title: String,
    pub minimum_session_minutes: u32,
    pub weekly_goal_minutes: u32,
    #[serde(default)]
    pub ideal_phase: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub days: WeekdaySet,
}

/// A named time-of-day window for one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Phase {
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub ideal_task_keywords: Vec<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl Phase {
    /// Whether `instant` lies in `[start, end)`.
    pub fn covers(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// Origin of a busy interval. Informational only; the sweep treats all alike.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BusyKind {
    Appointment,
    Anchor,
    Sleep,
    Work,
    /// Booked by the allocator during the current run.
    Booked,
}

/// A fixed `[start, end)` obligation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusyInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub kind: BusyKind,
}

impl BusyInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, kind: BusyKind) -> Self {
        Self { start, end, kind }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Check if this interval overlaps with a time range
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && self.end > start
    }
}

/// Sleep and work hours as local "HH:MM" strings. Absent means no constraint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    #[serde(default)]
    pub sleep_start: Option<String>,
    #[serde(default)]
    pub sleep_end: Option<String>,
    #[serde(default)]
    pub work_start: Option<String>,
    #[serde(default)]
    pub work_end: Option<String>,
}

/// What produced a plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlanSourceKind {
    Task,
    Habit,
}

impl PlanSourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanSourceKind::Task => "task",
            PlanSourceKind::Habit => "habit",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "task" => Some(PlanSourceKind::Task),
            "habit" => Some(PlanSourceKind::Habit),
            _ => None,
        }
    }
}

/// A plan as handed to the plan sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPlan {
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub source_id: String,
    pub source_kind: PlanSourceKind,
    #[serde(default)]
    pub note: Option<String>,
}

impl NewPlan {
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }
}

/// A persisted plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub id: PlanId,
    pub user_id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub source_id: String,
    pub source_kind: PlanSourceKind,
    #[serde(default)]
    pub note: Option<String>,
    /// Completed plans are never cleared by a reschedule.
    #[serde(default)]
    pub done: bool,
}

impl Plan {
    pub fn from_new(id: PlanId, user_id: &str, plan: NewPlan) -> Self {
        Self {
            id,
            user_id: user_id.to_string(),
            title: plan.title,
            start_time: plan.start_time,
            end_time: plan.end_time,
            source_id: plan.source_id,
            source_kind: plan.source_kind,
            note: plan.note,
            done: false,
        }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    pub fn overlaps(&self, other: &Plan) -> bool {
        self.start_time < other.end_time && other.start_time < self.end_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn urgency_accepts_tier_names() {
        assert_eq!("T1".parse::<UrgencyLevel>().unwrap(), UrgencyLevel::Critical);
        assert_eq!("low".parse::<UrgencyLevel>().unwrap(), UrgencyLevel::Low);
        assert!("urgent".parse::<UrgencyLevel>().is_err());

        let parsed: UrgencyLevel = serde_json::from_str("\"T2\"").unwrap();
        assert_eq!(parsed, UrgencyLevel::High);
        assert_eq!(parsed.tier(), 2);
        assert_eq!(UrgencyLevel::default(), UrgencyLevel::Medium);
    }

    #[test]
    fn task_deserializes_with_defaults() {
        let json = r#"{
            "id": "t-1",
            "title": "Write report",
            "effort_minutes": 90,
            "created_at": "2026-03-10T08:00:00Z"
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.urgency, UrgencyLevel::Medium);
        assert!(task.keywords.is_empty());
    }

    #[test]
    fn busy_interval_overlap_is_half_open() {
        let start = Utc::now();
        let interval = BusyInterval::new(start, start + Duration::minutes(30), BusyKind::Appointment);
        assert!(interval.overlaps(start + Duration::minutes(29), start + Duration::minutes(40)));
        assert!(!interval.overlaps(start + Duration::minutes(30), start + Duration::minutes(40)));
        assert_eq!(interval.duration_minutes(), 30);
    }
}
