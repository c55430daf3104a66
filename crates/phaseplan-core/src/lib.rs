//! # Phaseplan Core Library
//!
//! This library provides the scheduling engine behind phaseplan: it places
//! pending tasks and recurring habit sessions into a user's free time,
//! favouring the time-of-day phases each item suits best. All operations
//! are also available through the standalone `phaseplan-cli` binary.
//!
//! ## Architecture
//!
//! - **Sources**: Async collaborator traits for tasks, habits, obligations,
//!   phases and the plan sink, with in-memory and SQLite implementations
//! - **Timeline**: Obligation collection and free-slot detection
//! - **Scheduler**: Item preparation, phase suitability scoring and the
//!   greedy allocator, orchestrated per user
//! - **Storage**: SQLite persistence and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`Scheduler`]: Runs a scheduling pass over a time window
//! - [`ScheduleDb`]: SQLite store implementing every collaborator trait
//! - [`MemoryStore`]: In-memory store implementing every collaborator trait
//! - [`Config`]: Application configuration management

pub mod error;
pub mod schedule;
pub mod scheduler;
pub mod sources;
pub mod storage;
pub mod time_window;
pub mod timeline;

pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use schedule::{
    BusyInterval, BusyKind, Habit, NewPlan, Phase, Plan, PlanId, PlanSourceKind, Task,
    UrgencyLevel, UserProfile, WeekdaySet,
};
pub use scheduler::{
    Collaborators, ItemOutcome, ItemStatus, PriorityConfig, RunSummary, Scheduler,
    SchedulerConfig,
};
pub use sources::{
    HabitSource, MemoryStore, ObligationSource, PhaseSource, PhaseTemplate, PlanSink,
    TaskSource, TemplatePhaseSource,
};
pub use storage::{Config, ScheduleDb};
pub use time_window::TimeWindow;
pub use timeline::{FreeSlot, FreeSlotFinder};
