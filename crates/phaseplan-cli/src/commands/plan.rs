//! Planning commands for CLI.

use chrono::{Duration, Utc};
use clap::Subcommand;
use phaseplan_core::scheduler::ItemKind;
use phaseplan_core::time_window::start_of_day;
use phaseplan_core::{Collaborators, ItemStatus, RunSummary, Scheduler};

use super::Context;

#[derive(Subcommand)]
pub enum PlanAction {
    /// Plan one day from scratch
    Day {
        /// Day, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Only use time from now on
        #[arg(long)]
        from_now: bool,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replan from now through tomorrow
    Reschedule {
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// List plans for a day
    List {
        /// Day, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Mark a plan done
    Done {
        /// Plan ID
        id: String,
    },
}

fn scheduler(ctx: &Context) -> Scheduler {
    let config = ctx.config.scheduler.clone().with_offset(ctx.tz);
    Scheduler::new(Collaborators::from_store(ctx.db.clone()), config)
}

fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

fn status_label(status: ItemStatus) -> &'static str {
    match status {
        ItemStatus::FullyBooked => "full",
        ItemStatus::PartiallyBooked => "partial",
        ItemStatus::Pending => "unplaced",
    }
}

fn print_summary(ctx: &Context, summary: &RunSummary) {
    println!(
        "Planned {} to {}: {} plan(s)",
        summary.window.start.with_timezone(&ctx.tz).format("%Y-%m-%d %H:%M"),
        summary.window.end.with_timezone(&ctx.tz).format("%Y-%m-%d %H:%M"),
        summary.plans_created()
    );
    for item in &summary.items {
        let day = match item.kind {
            ItemKind::HabitInstance { day } => format!(" [{day}]"),
            ItemKind::Task => String::new(),
        };
        println!(
            "  {:<8} {:>4}/{:<4} min  {}{}",
            status_label(item.status),
            item.booked_minutes,
            item.requested_minutes,
            item.title,
            day
        );
        for booking in &item.bookings {
            println!(
                "           {}-{}  {}",
                ctx.clock(booking.start),
                ctx.clock(booking.end),
                booking.phase.as_deref().unwrap_or("-")
            );
        }
    }
}

fn report(ctx: &Context, summary: &RunSummary, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        print_summary(ctx, summary);
    }
    Ok(())
}

pub fn run(action: PlanAction) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::load()?;

    match action {
        PlanAction::Day {
            date,
            from_now,
            json,
        } => {
            let date = ctx.date_or_today(date.as_deref())?;
            let scheduler = scheduler(&ctx);
            let summary = runtime()?.block_on(scheduler.plan_date(
                ctx.user(),
                date,
                Utc::now(),
                from_now,
            ))?;
            report(&ctx, &summary, json)?;
        }
        PlanAction::Reschedule { json } => {
            let scheduler = scheduler(&ctx);
            let summary = runtime()?.block_on(scheduler.reschedule_from_now(ctx.user()))?;
            report(&ctx, &summary, json)?;
        }
        PlanAction::List { date, json } => {
            let date = ctx.date_or_today(date.as_deref())?;
            let from = start_of_day(date, &ctx.tz);
            let plans = ctx.db.list_plans(ctx.user(), from, from + Duration::days(1))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&plans)?);
            } else if plans.is_empty() {
                println!("No plans on {date}.");
            } else {
                for plan in &plans {
                    println!(
                        "{}-{}  {}  {:<6}  {}{}  [{}]",
                        ctx.clock(plan.start_time),
                        ctx.clock(plan.end_time),
                        if plan.done { "x" } else { " " },
                        plan.source_kind.as_str(),
                        plan.title,
                        plan.note
                            .as_ref()
                            .map(|n| format!(" ({n})"))
                            .unwrap_or_default(),
                        plan.id
                    );
                }
            }
        }
        PlanAction::Done { id } => match ctx.db.mark_plan_done(&id)? {
            Some(plan) => println!("Plan done: {} ({} min)", plan.title, plan.duration_minutes()),
            None => return Err(format!("Plan not found: {id}").into()),
        },
    }
    Ok(())
}
