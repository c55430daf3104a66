//! Conversion of tasks and habits into schedulable items.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};

use super::config::{PriorityConfig, SchedulerConfig};
use super::item::{ItemKind, SchedulableItem};
use crate::error::Result;
use crate::schedule::{Habit, Task, UrgencyLevel, WeekdaySet};
use crate::sources::HabitSource;
use crate::time_window::start_of_week;

/// Base score of an urgency tier.
pub fn tier_base(urgency: UrgencyLevel, cfg: &PriorityConfig) -> u32 {
    match urgency {
        UrgencyLevel::Critical => cfg.critical_base,
        UrgencyLevel::High => cfg.high_base,
        UrgencyLevel::Medium => cfg.medium_base,
        UrgencyLevel::Low => cfg.low_base,
    }
}

/// `tier_base + min(age_bonus_cap, whole days since creation)`.
pub fn task_priority(task: &Task, now: DateTime<Utc>, cfg: &PriorityConfig) -> u32 {
    let age_days = (now - task.created_at).num_days().max(0);
    let bonus = u32::try_from(age_days).unwrap_or(u32::MAX).min(cfg.age_bonus_cap);
    tier_base(task.urgency, cfg).saturating_add(bonus)
}

/// Item for a task; `None` when there is nothing left to schedule.
pub fn task_item(task: &Task, now: DateTime<Utc>, cfg: &SchedulerConfig) -> Option<SchedulableItem> {
    if task.effort_minutes == 0 {
        return None;
    }
    Some(SchedulableItem {
        kind: ItemKind::Task,
        source_id: task.id.clone(),
        title: task.title.clone(),
        priority_score: task_priority(task, now, &cfg.priority),
        remaining_minutes: task.effort_minutes,
        min_chunk_minutes: cfg.task_min_chunk_minutes,
        max_chunk_minutes: cfg.task_max_chunk_minutes.max(cfg.task_min_chunk_minutes),
        allowed_days: WeekdaySet::ALL,
        ideal_phase: None,
        keywords: task.keywords.clone(),
    })
}

/// One item per active day in `days`, unless the weekly goal is already met.
///
/// Each instance is locked to its own weekday.
pub fn habit_items(
    habit: &Habit,
    days: &[NaiveDate],
    weekly_progress: u32,
    cfg: &SchedulerConfig,
) -> Vec<SchedulableItem> {
    if weekly_progress >= habit.weekly_goal_minutes {
        tracing::debug!(habit = %habit.id, weekly_progress, "habit caught up for the week");
        return Vec::new();
    }

    let session = habit
        .minimum_session_minutes
        .max(cfg.habit_min_session_minutes);

    days.iter()
        .filter(|day| habit.days.contains_date(**day))
        .map(|day| SchedulableItem {
            kind: ItemKind::HabitInstance { day: *day },
            source_id: habit.id.clone(),
            title: habit.title.clone(),
            priority_score: cfg.priority.habit_baseline,
            remaining_minutes: session,
            min_chunk_minutes: cfg.habit_min_session_minutes,
            max_chunk_minutes: session,
            allowed_days: WeekdaySet::only_weekday(day.weekday()),
            ideal_phase: habit.ideal_phase.clone(),
            keywords: habit.keywords.clone(),
        })
        .collect()
}

/// Builds the ordered candidate list for a run.
pub struct ItemPreparer<'a> {
    config: &'a SchedulerConfig,
    tz: FixedOffset,
    now: DateTime<Utc>,
}

impl<'a> ItemPreparer<'a> {
    pub fn new(config: &'a SchedulerConfig, tz: FixedOffset, now: DateTime<Utc>) -> Self {
        Self { config, tz, now }
    }

    /// Items for `tasks` and `habits` over `days`, highest priority first.
    ///
    /// Weekly progress is read from the start of the week containing `now`,
    /// not from the window start.
    pub async fn prepare(
        &self,
        tasks: &[Task],
        habits: &[Habit],
        days: &[NaiveDate],
        progress: &dyn HabitSource,
    ) -> Result<Vec<SchedulableItem>> {
        let mut items: Vec<SchedulableItem> = tasks
            .iter()
            .filter_map(|t| task_item(t, self.now, self.config))
            .collect();

        let week_start = start_of_week(self.now, &self.tz);
        for habit in habits {
            let done = progress.weekly_progress_minutes(&habit.id, week_start).await?;
            items.extend(habit_items(habit, days, done, self.config));
        }

        items.sort_by(|a, b| b.priority_score.cmp(&a.priority_score));
        Ok(items)
    }
}
