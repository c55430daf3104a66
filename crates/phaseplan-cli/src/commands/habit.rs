//! Habit management commands for CLI.

use chrono::Utc;
use clap::Subcommand;
use phaseplan_core::{Habit, WeekdaySet};
use uuid::Uuid;

use super::{split_list, Context};

#[derive(Subcommand)]
pub enum HabitAction {
    /// Create a new habit
    Add {
        /// Habit title
        title: String,
        /// Shortest worthwhile session, in minutes
        #[arg(long, default_value = "15")]
        min_session: u32,
        /// Minutes to reach each week
        #[arg(long)]
        weekly_goal: u32,
        /// Name of the phase this habit suits best
        #[arg(long)]
        phase: Option<String>,
        /// Comma-separated keywords matched against phases
        #[arg(long)]
        keywords: Option<String>,
        /// daily, weekdays, weekends or e.g. "mon,wed,fri"
        #[arg(long, default_value = "daily")]
        days: String,
    },
    /// List habits
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Record practice time
    Log {
        /// Habit ID
        id: String,
        /// Minutes practiced
        minutes: u32,
    },
}

pub fn run(action: HabitAction) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::load()?;

    match action {
        HabitAction::Add {
            title,
            min_session,
            weekly_goal,
            phase,
            keywords,
            days,
        } => {
            let days: WeekdaySet = days.parse()?;
            if days.is_empty() {
                return Err("a habit needs at least one active day".into());
            }
            let habit = Habit {
                id: Uuid::new_v4().to_string(),
                title,
                minimum_session_minutes: min_session,
                weekly_goal_minutes: weekly_goal,
                ideal_phase: phase,
                keywords: split_list(keywords),
                days,
            };
            ctx.db.create_habit(ctx.user(), &habit)?;
            println!("Habit created: {}", habit.id);
        }
        HabitAction::List { json } => {
            let habits = ctx.db.list_habits(ctx.user())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&habits)?);
            } else if habits.is_empty() {
                println!("No habits.");
            } else {
                for habit in &habits {
                    println!(
                        "{}  {:>4} min/week  {:<10}  {}{}",
                        habit.id,
                        habit.weekly_goal_minutes,
                        habit.days.to_string(),
                        habit.title,
                        habit
                            .ideal_phase
                            .as_ref()
                            .map(|p| format!(" ({p})"))
                            .unwrap_or_default()
                    );
                }
            }
        }
        HabitAction::Log { id, minutes } => {
            if !ctx.db.list_habits(ctx.user())?.iter().any(|h| h.id == id) {
                return Err(format!("Habit not found: {id}").into());
            }
            ctx.db.log_habit_session(&id, Utc::now(), minutes)?;
            println!("Logged {minutes} min for {id}");
        }
    }
    Ok(())
}
