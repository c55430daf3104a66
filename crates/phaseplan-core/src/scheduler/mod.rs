//! Phase-aware automatic scheduler.
//!
//! This module places pending tasks and habit sessions into free time:
//! - Clears the pending plans it previously produced for the window
//! - Collects obligations and phases once per run
//! - Books items in priority order, each into its best-scoring free slot
//! - Serializes runs per user and honours cancellation between items

mod allocator;
mod config;
mod item;
mod locks;
mod prepare;
mod suitability;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, Result};
use crate::schedule::Habit;
use crate::sources::{HabitSource, ObligationSource, PhaseSource, PlanSink, TaskSource};
use crate::time_window::{end_of_day, local_date, start_of_day, start_of_day_containing, TimeWindow};
use crate::timeline::{collect_obligations, PhaseCalendar};

pub use allocator::{Allocator, Booking};
pub use config::{PriorityConfig, SchedulerConfig};
pub use item::{ItemKind, ItemStatus, SchedulableItem};
pub use locks::UserLocks;
pub use prepare::{habit_items, task_item, task_priority, tier_base, ItemPreparer};
pub use suitability::suitability;

/// The external stores a scheduler reads from and books into.
#[derive(Clone)]
pub struct Collaborators {
    pub tasks: Arc<dyn TaskSource>,
    pub habits: Arc<dyn HabitSource>,
    pub obligations: Arc<dyn ObligationSource>,
    pub phases: Arc<dyn PhaseSource>,
    pub plans: Arc<dyn PlanSink>,
}

impl Collaborators {
    /// Use one store for every role.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: TaskSource + HabitSource + ObligationSource + PhaseSource + PlanSink + 'static,
    {
        Self {
            tasks: store.clone(),
            habits: store.clone(),
            obligations: store.clone(),
            phases: store.clone(),
            plans: store,
        }
    }
}

/// How one item fared in a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub source_id: String,
    pub title: String,
    pub kind: ItemKind,
    pub priority_score: u32,
    pub requested_minutes: u32,
    pub booked_minutes: u32,
    pub status: ItemStatus,
    pub bookings: Vec<Booking>,
}

/// Result of a completed scheduling run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub user_id: String,
    pub window: TimeWindow,
    /// Pending plans from this instant onward were removed first.
    pub cleared_from: DateTime<Utc>,
    pub items: Vec<ItemOutcome>,
}

impl RunSummary {
    pub fn plans_created(&self) -> usize {
        self.items.iter().map(|i| i.bookings.len()).sum()
    }

    /// Items that got less than they asked for.
    pub fn unplaced(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.items.iter().filter(|i| i.status != ItemStatus::FullyBooked)
    }
}

/// Greedy multi-day scheduler.
pub struct Scheduler {
    sources: Collaborators,
    config: SchedulerConfig,
    tz: FixedOffset,
    locks: UserLocks,
}

impl Scheduler {
    pub fn new(sources: Collaborators, config: SchedulerConfig) -> Self {
        let tz = config.time_zone();
        Self {
            sources,
            config,
            tz,
            locks: UserLocks::new(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn time_zone(&self) -> FixedOffset {
        self.tz
    }

    /// Window for one calendar day: from midnight, or from `now` when
    /// `from_now` is set, through 23:59:59.999.
    ///
    /// Planning a day that is already over from now yields an empty window
    /// at the end of that day.
    pub fn date_window(&self, date: NaiveDate, now: DateTime<Utc>, from_now: bool) -> TimeWindow {
        let midnight = start_of_day(date, &self.tz);
        let end = end_of_day(date, &self.tz);
        let start = if from_now { now.clamp(midnight, end) } else { midnight };
        TimeWindow { start, end }
    }

    /// Window from `now` through the end of the next calendar day.
    pub fn reschedule_window(&self, now: DateTime<Utc>) -> TimeWindow {
        let tomorrow = local_date(now, &self.tz) + Duration::days(1);
        TimeWindow {
            start: now,
            end: end_of_day(tomorrow, &self.tz),
        }
    }

    /// Plan a specific date.
    pub async fn plan_date(
        &self,
        user_id: &str,
        date: NaiveDate,
        now: DateTime<Utc>,
        from_now: bool,
    ) -> Result<RunSummary> {
        let window = self.date_window(date, now, from_now);
        self.execute_scheduling(user_id, window, now, &CancellationToken::new())
            .await
    }

    /// Replan from `now` through tomorrow.
    pub async fn reschedule_from(&self, user_id: &str, now: DateTime<Utc>) -> Result<RunSummary> {
        let window = self.reschedule_window(now);
        self.execute_scheduling(user_id, window, now, &CancellationToken::new())
            .await
    }

    /// Replan from the current wall-clock time through tomorrow.
    pub async fn reschedule_from_now(&self, user_id: &str) -> Result<RunSummary> {
        self.reschedule_from(user_id, Utc::now()).await
    }

    /// Run one full scheduling pass over `window`.
    ///
    /// Pending plans are cleared from the start of the day containing
    /// `window.start`, so a partial-day replan leaves no stale plan earlier
    /// that day. Plans booked before a collaborator failure or a
    /// cancellation are kept.
    #[tracing::instrument(name = "schedule", skip_all, fields(user = %user_id, start = %window.start, end = %window.end))]
    pub async fn execute_scheduling(
        &self,
        user_id: &str,
        window: TimeWindow,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        let _guard = self.locks.acquire(user_id).await;
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        let cleared_from = start_of_day_containing(window.start, &self.tz);
        self.sources
            .plans
            .delete_pending_plans_from(user_id, cleared_from)
            .await?;

        let days = window.days(&self.tz);
        let tasks = self
            .sources
            .tasks
            .top_priority_tasks(user_id, self.config.candidate_limit)
            .await?;
        let habits = self.active_habits(user_id, &days).await?;

        let items = ItemPreparer::new(&self.config, self.tz, now)
            .prepare(&tasks, &habits, &days, self.sources.habits.as_ref())
            .await?;
        tracing::info!(tasks = tasks.len(), habits = habits.len(), items = items.len(), "scheduling run started");

        let busy = collect_obligations(self.sources.obligations.as_ref(), user_id, &window, &self.tz).await?;
        let phases = PhaseCalendar::load(self.sources.phases.as_ref(), &window, self.tz).await?;
        let mut allocator = Allocator::new(
            user_id,
            window,
            busy,
            phases,
            self.sources.plans.as_ref(),
            &self.config,
        );

        let mut outcomes = Vec::with_capacity(items.len());
        for mut item in items {
            if cancel.is_cancelled() {
                tracing::info!(done = outcomes.len(), "scheduling run cancelled");
                return Err(CoreError::Cancelled);
            }

            let requested = item.remaining_minutes;
            let bookings = allocator.allocate(&mut item).await?;
            let booked: u32 = bookings.iter().map(|b| b.minutes).sum();
            let status = ItemStatus::from_minutes(booked, item.remaining_minutes);
            if status != ItemStatus::FullyBooked {
                tracing::info!(
                    item = %item.source_id,
                    booked,
                    remaining = item.remaining_minutes,
                    "item not fully placed"
                );
            }

            outcomes.push(ItemOutcome {
                source_id: item.source_id,
                title: item.title,
                kind: item.kind,
                priority_score: item.priority_score,
                requested_minutes: requested,
                booked_minutes: booked,
                status,
                bookings,
            });
        }

        let summary = RunSummary {
            user_id: user_id.to_string(),
            window,
            cleared_from,
            items: outcomes,
        };
        tracing::info!(plans = summary.plans_created(), "scheduling run finished");
        Ok(summary)
    }

    /// Habits active on any day of the window, each listed once.
    async fn active_habits(&self, user_id: &str, days: &[NaiveDate]) -> Result<Vec<Habit>> {
        let mut seen = HashSet::new();
        let mut habits = Vec::new();
        for day in days {
            for habit in self.sources.habits.habits_active_on(user_id, day.weekday()).await? {
                if seen.insert(habit.id.clone()) {
                    habits.push(habit);
                }
            }
        }
        Ok(habits)
    }
}
