//! Collaborator interfaces the scheduler reads from and writes to.
//!
//! Every store the engine talks to implements these traits. Implementations
//! are stateless from the scheduler's point of view: a run fetches what it
//! needs, books plans through the sink and keeps nothing afterwards.

mod memory;
mod phase_template;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc, Weekday};

use crate::error::Result;
use crate::schedule::{BusyInterval, Habit, NewPlan, Phase, PlanId, Task, UserProfile};

pub use memory::MemoryStore;
pub use phase_template::{default_phase_templates, PhaseTemplate, TemplatePhaseSource};

/// Supplies pending tasks.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Up to `limit` pending tasks, highest priority first.
    async fn top_priority_tasks(&self, user_id: &str, limit: usize) -> Result<Vec<Task>>;
}

/// Supplies recurring habits and their weekly progress.
#[async_trait]
pub trait HabitSource: Send + Sync {
    /// Habits configured to run on `weekday`.
    async fn habits_active_on(&self, user_id: &str, weekday: Weekday) -> Result<Vec<Habit>>;

    /// Minutes logged for the habit since `week_start`.
    async fn weekly_progress_minutes(&self, habit_id: &str, week_start: DateTime<Utc>)
        -> Result<u32>;
}

/// Supplies fixed obligations and the user's sleep/work profile.
#[async_trait]
pub trait ObligationSource: Send + Sync {
    async fn appointments(&self, user_id: &str, date: NaiveDate) -> Result<Vec<BusyInterval>>;

    /// Ritual/practice blocks that behave like appointments.
    async fn anchors(&self, user_id: &str, date: NaiveDate) -> Result<Vec<BusyInterval>>;

    async fn profile(&self, user_id: &str) -> Result<UserProfile>;
}

/// Supplies the time-of-day phases for a calendar day.
#[async_trait]
pub trait PhaseSource: Send + Sync {
    async fn phases_for_date(&self, date: NaiveDate) -> Result<Vec<Phase>>;
}

/// Persists and clears scheduler output.
#[async_trait]
pub trait PlanSink: Send + Sync {
    async fn create_plan(&self, user_id: &str, plan: NewPlan) -> Result<PlanId>;

    /// Remove every plan not yet marked done that starts at or after `from`.
    async fn delete_pending_plans_from(&self, user_id: &str, from: DateTime<Utc>) -> Result<()>;
}
