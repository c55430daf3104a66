//! In-memory collaborator store.
//!
//! Implements every source trait plus the plan sink over plain collections.
//! Embedders use it for ephemeral planning; the test suites use it to
//! observe exactly what a run asked for and what it booked.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc, Weekday};

use super::{HabitSource, ObligationSource, PhaseSource, PlanSink, TaskSource};
use crate::error::{CoreError, Result};
use crate::schedule::{BusyInterval, BusyKind, Habit, NewPlan, Phase, Plan, PlanId, Task, UserProfile};
use crate::time_window::start_of_day;

#[derive(Default)]
struct State {
    tasks: HashMap<String, Vec<Task>>,
    habits: HashMap<String, Vec<Habit>>,
    habit_log: HashMap<String, Vec<(DateTime<Utc>, u32)>>,
    obligations: HashMap<String, Vec<BusyInterval>>,
    profiles: HashMap<String, UserProfile>,
    phases: HashMap<NaiveDate, Vec<Phase>>,
    plans: Vec<Plan>,
    next_plan: u64,
    cleared_from: Vec<(String, DateTime<Utc>)>,
    fail_after_plans: Option<usize>,
}

/// Thread-safe in-memory store.
pub struct MemoryStore {
    tz: FixedOffset,
    state: Mutex<State>,
}

impl MemoryStore {
    /// Create an empty store whose calendar days follow `tz`.
    pub fn new(tz: FixedOffset) -> Self {
        Self {
            tz,
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_task(&self, user_id: &str, task: Task) {
        self.state().tasks.entry(user_id.to_string()).or_default().push(task);
    }

    pub fn add_habit(&self, user_id: &str, habit: Habit) {
        self.state().habits.entry(user_id.to_string()).or_default().push(habit);
    }

    /// Record `minutes` of practice for a habit at `at`.
    pub fn log_habit(&self, habit_id: &str, at: DateTime<Utc>, minutes: u32) {
        self.state()
            .habit_log
            .entry(habit_id.to_string())
            .or_default()
            .push((at, minutes));
    }

    pub fn add_appointment(&self, user_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.add_obligation(user_id, BusyInterval::new(start, end, BusyKind::Appointment));
    }

    pub fn add_anchor(&self, user_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.add_obligation(user_id, BusyInterval::new(start, end, BusyKind::Anchor));
    }

    fn add_obligation(&self, user_id: &str, interval: BusyInterval) {
        self.state()
            .obligations
            .entry(user_id.to_string())
            .or_default()
            .push(interval);
    }

    pub fn set_profile(&self, user_id: &str, profile: UserProfile) {
        self.state().profiles.insert(user_id.to_string(), profile);
    }

    pub fn set_phases(&self, date: NaiveDate, phases: Vec<Phase>) {
        self.state().phases.insert(date, phases);
    }

    /// Make `create_plan` fail once `count` plans have been created.
    pub fn fail_after_plans(&self, count: usize) {
        self.state().fail_after_plans = Some(count);
    }

    /// All plans for a user, ordered by start time.
    pub fn plans(&self, user_id: &str) -> Vec<Plan> {
        let mut plans: Vec<Plan> = self
            .state()
            .plans
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        plans.sort_by_key(|p| p.start_time);
        plans
    }

    /// Every `delete_pending_plans_from` call received, in order.
    pub fn cleared_from(&self) -> Vec<(String, DateTime<Utc>)> {
        self.state().cleared_from.clone()
    }

    pub fn mark_done(&self, plan_id: &str) -> bool {
        let mut state = self.state();
        match state.plans.iter_mut().find(|p| p.id == plan_id) {
            Some(plan) => {
                plan.done = true;
                true
            }
            None => false,
        }
    }

    fn intervals_on(&self, user_id: &str, date: NaiveDate, kind: BusyKind) -> Vec<BusyInterval> {
        let day_start = start_of_day(date, &self.tz);
        let day_end = day_start + Duration::days(1);
        self.state()
            .obligations
            .get(user_id)
            .map(|all| {
                all.iter()
                    .filter(|i| i.kind == kind && i.overlaps(day_start, day_end))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl TaskSource for MemoryStore {
    async fn top_priority_tasks(&self, user_id: &str, limit: usize) -> Result<Vec<Task>> {
        let mut tasks = self.state().tasks.get(user_id).cloned().unwrap_or_default();
        tasks.sort_by(|a, b| {
            a.urgency
                .cmp(&b.urgency)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        tasks.truncate(limit);
        Ok(tasks)
    }
}

#[async_trait]
impl HabitSource for MemoryStore {
    async fn habits_active_on(&self, user_id: &str, weekday: Weekday) -> Result<Vec<Habit>> {
        Ok(self
            .state()
            .habits
            .get(user_id)
            .map(|all| {
                all.iter()
                    .filter(|h| h.days.contains_weekday(weekday))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn weekly_progress_minutes(
        &self,
        habit_id: &str,
        week_start: DateTime<Utc>,
    ) -> Result<u32> {
        Ok(self
            .state()
            .habit_log
            .get(habit_id)
            .map(|log| {
                log.iter()
                    .filter(|(at, _)| *at >= week_start)
                    .map(|(_, minutes)| *minutes)
                    .sum()
            })
            .unwrap_or(0))
    }
}

#[async_trait]
impl ObligationSource for MemoryStore {
    async fn appointments(&self, user_id: &str, date: NaiveDate) -> Result<Vec<BusyInterval>> {
        Ok(self.intervals_on(user_id, date, BusyKind::Appointment))
    }

    async fn anchors(&self, user_id: &str, date: NaiveDate) -> Result<Vec<BusyInterval>> {
        Ok(self.intervals_on(user_id, date, BusyKind::Anchor))
    }

    async fn profile(&self, user_id: &str) -> Result<UserProfile> {
        Ok(self.state().profiles.get(user_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl PhaseSource for MemoryStore {
    async fn phases_for_date(&self, date: NaiveDate) -> Result<Vec<Phase>> {
        Ok(self.state().phases.get(&date).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl PlanSink for MemoryStore {
    async fn create_plan(&self, user_id: &str, plan: NewPlan) -> Result<PlanId> {
        let mut state = self.state();
        if let Some(limit) = state.fail_after_plans {
            let created = state.plans.iter().filter(|p| !p.done).count();
            if created >= limit {
                return Err(CoreError::collaborator_msg("plan sink", "injected failure"));
            }
        }
        state.next_plan += 1;
        let id = format!("plan-{}", state.next_plan);
        state.plans.push(Plan::from_new(id.clone(), user_id, plan));
        Ok(id)
    }

    async fn delete_pending_plans_from(&self, user_id: &str, from: DateTime<Utc>) -> Result<()> {
        let mut state = self.state();
        state.cleared_from.push((user_id.to_string(), from));
        state
            .plans
            .retain(|p| p.user_id != user_id || p.done || p.start_time < from);
        Ok(())
    }
}
