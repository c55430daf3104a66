//! Task management commands for CLI.

use chrono::Utc;
use clap::Subcommand;
use phaseplan_core::{Task, UrgencyLevel};
use uuid::Uuid;

use super::{split_list, Context};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new task
    Add {
        /// Task title
        title: String,
        /// Effort still needed, in minutes
        #[arg(long)]
        effort: u32,
        /// critical, high, medium or low (T1-T4 also accepted)
        #[arg(long, default_value = "medium")]
        urgency: String,
        /// Comma-separated keywords matched against phases
        #[arg(long)]
        keywords: Option<String>,
    },
    /// List tasks
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Delete a task
    Remove {
        /// Task ID
        id: String,
    },
}

pub fn run(action: TaskAction) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::load()?;

    match action {
        TaskAction::Add {
            title,
            effort,
            urgency,
            keywords,
        } => {
            if effort == 0 {
                return Err("effort must be at least one minute".into());
            }
            let task = Task {
                id: Uuid::new_v4().to_string(),
                title,
                effort_minutes: effort,
                urgency: urgency.parse::<UrgencyLevel>()?,
                created_at: Utc::now(),
                keywords: split_list(keywords),
            };
            ctx.db.create_task(ctx.user(), &task)?;
            println!("Task created: {}", task.id);
        }
        TaskAction::List { json } => {
            let tasks = ctx.db.list_tasks(ctx.user())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else if tasks.is_empty() {
                println!("No tasks.");
            } else {
                for task in &tasks {
                    println!(
                        "{}  {:<8}  {:>4} min  {}",
                        task.id, task.urgency.as_str(), task.effort_minutes, task.title
                    );
                }
            }
        }
        TaskAction::Remove { id } => {
            if ctx.db.delete_task(&id)? {
                println!("Task deleted: {id}");
            } else {
                return Err(format!("Task not found: {id}").into());
            }
        }
    }
    Ok(())
}
