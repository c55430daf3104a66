//! SQLite-based storage for tasks, habits, obligations and plans.
//!
//! `ScheduleDb` implements every collaborator trait, so one database can
//! back a whole scheduling run. The sleep/work profile and the phase
//! templates come from configuration rather than from tables.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, SecondsFormat, Utc, Weekday};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::data_dir;
use crate::error::{CoreError, DatabaseError, Result};
use crate::schedule::{
    BusyInterval, BusyKind, Habit, NewPlan, Phase, Plan, PlanId, PlanSourceKind, Task,
    UrgencyLevel, UserProfile, WeekdaySet,
};
use crate::sources::{
    default_phase_templates, HabitSource, ObligationSource, PhaseSource, PhaseTemplate, PlanSink,
    TaskSource, TemplatePhaseSource,
};
use crate::time_window::start_of_day;

// === Helper Functions ===

/// Format an instant for storage. Fixed width, so text order is time order.
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse datetime from RFC3339 string
fn parse_datetime(idx: usize, dt_str: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(dt_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Parse a JSON string list, tolerating malformed legacy values
fn parse_keywords(json: &str) -> Vec<String> {
    serde_json::from_str(json).unwrap_or_default()
}

fn parse_urgency(urgency_str: &str) -> UrgencyLevel {
    urgency_str.parse().unwrap_or_default()
}

fn parse_busy_kind(kind_str: &str) -> BusyKind {
    match kind_str {
        "anchor" => BusyKind::Anchor,
        _ => BusyKind::Appointment,
    }
}

fn format_busy_kind(kind: BusyKind) -> &'static str {
    match kind {
        BusyKind::Anchor => "anchor",
        _ => "appointment",
    }
}

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    let urgency: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    let keywords: String = row.get(5)?;
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        effort_minutes: row.get(2)?,
        urgency: parse_urgency(&urgency),
        created_at: parse_datetime(4, &created_at)?,
        keywords: parse_keywords(&keywords),
    })
}

fn row_to_habit(row: &rusqlite::Row) -> rusqlite::Result<Habit> {
    let keywords: String = row.get(5)?;
    let days: u8 = row.get(6)?;
    Ok(Habit {
        id: row.get(0)?,
        title: row.get(1)?,
        minimum_session_minutes: row.get(2)?,
        weekly_goal_minutes: row.get(3)?,
        ideal_phase: row.get(4)?,
        keywords: parse_keywords(&keywords),
        days: WeekdaySet::from_bits(days),
    })
}

fn row_to_obligation(row: &rusqlite::Row) -> rusqlite::Result<ObligationRecord> {
    let kind: String = row.get(3)?;
    let start: String = row.get(4)?;
    let end: String = row.get(5)?;
    Ok(ObligationRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        kind: parse_busy_kind(&kind),
        start: parse_datetime(4, &start)?,
        end: parse_datetime(5, &end)?,
    })
}

fn row_to_plan(row: &rusqlite::Row) -> rusqlite::Result<Plan> {
    let start: String = row.get(3)?;
    let end: String = row.get(4)?;
    let kind: String = row.get(6)?;
    Ok(Plan {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        start_time: parse_datetime(3, &start)?,
        end_time: parse_datetime(4, &end)?,
        source_id: row.get(5)?,
        source_kind: PlanSourceKind::parse(&kind).unwrap_or(PlanSourceKind::Task),
        note: row.get(7)?,
        done: row.get(8)?,
    })
}

const TASK_COLUMNS: &str = "id, title, effort_minutes, urgency, created_at, keywords";
const HABIT_COLUMNS: &str =
    "id, title, minimum_session_minutes, weekly_goal_minutes, ideal_phase, keywords, days";
const OBLIGATION_COLUMNS: &str = "id, user_id, title, kind, start_time, end_time";
const PLAN_COLUMNS: &str =
    "id, user_id, title, start_time, end_time, source_id, source_kind, note, done";

/// A stored appointment or anchor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObligationRecord {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub kind: BusyKind,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ObligationRecord {
    pub fn interval(&self) -> BusyInterval {
        BusyInterval::new(self.start, self.end, self.kind)
    }
}

/// SQLite database for schedule storage.
pub struct ScheduleDb {
    conn: Mutex<Connection>,
    profile: UserProfile,
    phases: TemplatePhaseSource,
    tz: FixedOffset,
}

impl ScheduleDb {
    /// Open the schedule database at `~/.config/phaseplan/phaseplan.db`.
    ///
    /// Creates tables if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("phaseplan.db");
        Self::open_at(&path)
    }

    /// Open (or create) a database file at `path`.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let tz = Utc.fix();
        let db = Self {
            conn: Mutex::new(conn),
            profile: UserProfile::default(),
            phases: TemplatePhaseSource::new(default_phase_templates(), tz),
            tz,
        };
        db.migrate()?;
        Ok(db)
    }

    /// Use `profile` for sleep/work obligations.
    pub fn with_profile(mut self, profile: UserProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Use `templates` for phases and `tz` for calendar-day boundaries.
    pub fn with_phases(mut self, templates: Vec<PhaseTemplate>, tz: FixedOffset) -> Self {
        self.phases = TemplatePhaseSource::new(templates, tz);
        self.tz = tz;
        self
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DatabaseError::Poisoned.into())
    }

    fn migrate(&self) -> Result<()> {
        self.conn()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS tasks (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL,
                title           TEXT NOT NULL,
                effort_minutes  INTEGER NOT NULL,
                urgency         TEXT NOT NULL DEFAULT 'medium',
                created_at      TEXT NOT NULL,
                keywords        TEXT NOT NULL DEFAULT '[]'
            );

            CREATE TABLE IF NOT EXISTS habits (
                id                       TEXT PRIMARY KEY,
                user_id                  TEXT NOT NULL,
                title                    TEXT NOT NULL,
                minimum_session_minutes  INTEGER NOT NULL,
                weekly_goal_minutes      INTEGER NOT NULL,
                ideal_phase              TEXT,
                keywords                 TEXT NOT NULL DEFAULT '[]',
                days                     INTEGER NOT NULL DEFAULT 127
            );

            CREATE TABLE IF NOT EXISTS habit_sessions (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                habit_id   TEXT NOT NULL,
                logged_at  TEXT NOT NULL,
                minutes    INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS obligations (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL,
                title       TEXT NOT NULL,
                kind        TEXT NOT NULL,
                start_time  TEXT NOT NULL,
                end_time    TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS plans (
                id           TEXT PRIMARY KEY,
                user_id      TEXT NOT NULL,
                title        TEXT NOT NULL,
                start_time   TEXT NOT NULL,
                end_time     TEXT NOT NULL,
                source_id    TEXT NOT NULL,
                source_kind  TEXT NOT NULL,
                note         TEXT,
                done         INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id);
            CREATE INDEX IF NOT EXISTS idx_habit_sessions_habit ON habit_sessions(habit_id, logged_at);
            CREATE INDEX IF NOT EXISTS idx_obligations_user_start ON obligations(user_id, start_time);
            CREATE INDEX IF NOT EXISTS idx_plans_user_start ON plans(user_id, start_time);",
        )?;
        Ok(())
    }

    // === Tasks ===

    pub fn create_task(&self, user_id: &str, task: &Task) -> Result<()> {
        let keywords = serde_json::to_string(&task.keywords)?;
        self.conn()?.execute(
            "INSERT INTO tasks (id, user_id, title, effort_minutes, urgency, created_at, keywords)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                task.id,
                user_id,
                task.title,
                task.effort_minutes,
                task.urgency.as_str(),
                format_datetime(task.created_at),
                keywords,
            ],
        )?;
        Ok(())
    }

    pub fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let conn = self.conn()?;
        let task = conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    /// All tasks for a user, oldest first.
    pub fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1 ORDER BY created_at, id"
        ))?;
        let tasks = stmt
            .query_map(params![user_id], row_to_task)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    /// Delete a task. Returns whether it existed.
    pub fn delete_task(&self, id: &str) -> Result<bool> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    // === Habits ===

    pub fn create_habit(&self, user_id: &str, habit: &Habit) -> Result<()> {
        let keywords = serde_json::to_string(&habit.keywords)?;
        self.conn()?.execute(
            "INSERT INTO habits (id, user_id, title, minimum_session_minutes, weekly_goal_minutes,
                                 ideal_phase, keywords, days)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                habit.id,
                user_id,
                habit.title,
                habit.minimum_session_minutes,
                habit.weekly_goal_minutes,
                habit.ideal_phase,
                keywords,
                habit.days.bits(),
            ],
        )?;
        Ok(())
    }

    pub fn list_habits(&self, user_id: &str) -> Result<Vec<Habit>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {HABIT_COLUMNS} FROM habits WHERE user_id = ?1 ORDER BY title, id"
        ))?;
        let habits = stmt
            .query_map(params![user_id], row_to_habit)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(habits)
    }

    /// Record minutes spent on a habit.
    pub fn log_habit_session(&self, habit_id: &str, at: DateTime<Utc>, minutes: u32) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO habit_sessions (habit_id, logged_at, minutes) VALUES (?1, ?2, ?3)",
            params![habit_id, format_datetime(at), minutes],
        )?;
        Ok(())
    }

    fn minutes_logged_since(&self, habit_id: &str, since: DateTime<Utc>) -> Result<u32> {
        let minutes: u32 = self.conn()?.query_row(
            "SELECT COALESCE(SUM(minutes), 0) FROM habit_sessions
             WHERE habit_id = ?1 AND logged_at >= ?2",
            params![habit_id, format_datetime(since)],
            |row| row.get(0),
        )?;
        Ok(minutes)
    }

    // === Obligations ===

    /// Store an appointment or anchor. Returns its id.
    pub fn add_obligation(
        &self,
        user_id: &str,
        title: &str,
        interval: &BusyInterval,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.conn()?.execute(
            "INSERT INTO obligations (id, user_id, title, kind, start_time, end_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                user_id,
                title,
                format_busy_kind(interval.kind),
                format_datetime(interval.start),
                format_datetime(interval.end),
            ],
        )?;
        Ok(id)
    }

    /// Obligations overlapping `[from, to)`, ordered by start.
    pub fn list_obligations(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ObligationRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {OBLIGATION_COLUMNS} FROM obligations
             WHERE user_id = ?1 AND start_time < ?3 AND end_time > ?2
             ORDER BY start_time"
        ))?;
        let records = stmt
            .query_map(
                params![user_id, format_datetime(from), format_datetime(to)],
                row_to_obligation,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn obligations_on(&self, user_id: &str, date: NaiveDate, kind: BusyKind) -> Result<Vec<BusyInterval>> {
        let day_start = start_of_day(date, &self.tz);
        let records = self.list_obligations(user_id, day_start, day_start + Duration::days(1))?;
        Ok(records
            .iter()
            .filter(|r| r.kind == kind)
            .map(ObligationRecord::interval)
            .collect())
    }

    // === Plans ===

    pub fn get_plan(&self, id: &str) -> Result<Option<Plan>> {
        let conn = self.conn()?;
        let plan = conn
            .query_row(
                &format!("SELECT {PLAN_COLUMNS} FROM plans WHERE id = ?1"),
                params![id],
                row_to_plan,
            )
            .optional()?;
        Ok(plan)
    }

    /// Plans starting in `[from, to)`, ordered by start.
    pub fn list_plans(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Plan>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PLAN_COLUMNS} FROM plans
             WHERE user_id = ?1 AND start_time >= ?2 AND start_time < ?3
             ORDER BY start_time"
        ))?;
        let plans = stmt
            .query_map(
                params![user_id, format_datetime(from), format_datetime(to)],
                row_to_plan,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(plans)
    }

    /// Mark a plan done and credit its minutes to the source.
    ///
    /// A habit plan logs a session at the plan's start; a task plan reduces
    /// the task's remaining effort. Returns `None` for an unknown id, and
    /// leaves an already-done plan untouched.
    pub fn mark_plan_done(&self, id: &str) -> Result<Option<Plan>> {
        let Some(mut plan) = self.get_plan(id)? else {
            return Ok(None);
        };
        if plan.done {
            return Ok(Some(plan));
        }

        let minutes = u32::try_from(plan.duration_minutes().max(0)).unwrap_or(u32::MAX);
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("UPDATE plans SET done = 1 WHERE id = ?1", params![id])?;
        match plan.source_kind {
            PlanSourceKind::Habit => {
                tx.execute(
                    "INSERT INTO habit_sessions (habit_id, logged_at, minutes) VALUES (?1, ?2, ?3)",
                    params![plan.source_id, format_datetime(plan.start_time), minutes],
                )?;
            }
            PlanSourceKind::Task => {
                tx.execute(
                    "UPDATE tasks SET effort_minutes = MAX(effort_minutes - ?2, 0) WHERE id = ?1",
                    params![plan.source_id, minutes],
                )?;
            }
        }
        tx.commit()?;

        plan.done = true;
        Ok(Some(plan))
    }
}

#[async_trait]
impl TaskSource for ScheduleDb {
    async fn top_priority_tasks(&self, user_id: &str, limit: usize) -> Result<Vec<Task>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE user_id = ?1 AND effort_minutes > 0
             ORDER BY CASE urgency
                        WHEN 'critical' THEN 1
                        WHEN 'high' THEN 2
                        WHEN 'medium' THEN 3
                        ELSE 4
                      END,
                      created_at
             LIMIT ?2"
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let tasks = stmt
            .query_map(params![user_id, limit], row_to_task)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }
}

#[async_trait]
impl HabitSource for ScheduleDb {
    async fn habits_active_on(&self, user_id: &str, weekday: Weekday) -> Result<Vec<Habit>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {HABIT_COLUMNS} FROM habits
             WHERE user_id = ?1 AND (days & ?2) != 0
             ORDER BY title, id"
        ))?;
        let bit = WeekdaySet::only_weekday(weekday).bits();
        let habits = stmt
            .query_map(params![user_id, bit], row_to_habit)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(habits)
    }

    async fn weekly_progress_minutes(
        &self,
        habit_id: &str,
        week_start: DateTime<Utc>,
    ) -> Result<u32> {
        self.minutes_logged_since(habit_id, week_start)
    }
}

#[async_trait]
impl ObligationSource for ScheduleDb {
    async fn appointments(&self, user_id: &str, date: NaiveDate) -> Result<Vec<BusyInterval>> {
        self.obligations_on(user_id, date, BusyKind::Appointment)
    }

    async fn anchors(&self, user_id: &str, date: NaiveDate) -> Result<Vec<BusyInterval>> {
        self.obligations_on(user_id, date, BusyKind::Anchor)
    }

    async fn profile(&self, _user_id: &str) -> Result<UserProfile> {
        Ok(self.profile.clone())
    }
}

#[async_trait]
impl PhaseSource for ScheduleDb {
    async fn phases_for_date(&self, date: NaiveDate) -> Result<Vec<Phase>> {
        Ok(self.phases.phases_on(date))
    }
}

#[async_trait]
impl PlanSink for ScheduleDb {
    async fn create_plan(&self, user_id: &str, plan: NewPlan) -> Result<PlanId> {
        let id = Uuid::new_v4().to_string();
        self.conn()?
            .execute(
                "INSERT INTO plans (id, user_id, title, start_time, end_time, source_id, source_kind, note, done)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)",
                params![
                    id,
                    user_id,
                    plan.title,
                    format_datetime(plan.start_time),
                    format_datetime(plan.end_time),
                    plan.source_id,
                    plan.source_kind.as_str(),
                    plan.note,
                ],
            )
            .map_err(|e| CoreError::collaborator("plan sink", e))?;
        Ok(id)
    }

    async fn delete_pending_plans_from(&self, user_id: &str, from: DateTime<Utc>) -> Result<()> {
        let deleted = self.conn()?.execute(
            "DELETE FROM plans WHERE user_id = ?1 AND done = 0 AND start_time >= ?2",
            params![user_id, format_datetime(from)],
        )?;
        tracing::debug!(user = %user_id, deleted, "cleared pending plans");
        Ok(())
    }
}
