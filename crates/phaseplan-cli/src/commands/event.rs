//! Appointment and anchor commands for CLI.

use chrono::Duration;
use clap::{Args, Subcommand};
use phaseplan_core::time_window::start_of_day;
use phaseplan_core::{BusyInterval, BusyKind};

use super::Context;

#[derive(Args)]
pub struct EventSpec {
    /// Title
    title: String,
    /// Local start time, HH:MM
    #[arg(long)]
    start: String,
    /// Local end time, HH:MM
    #[arg(long)]
    end: String,
    /// Day, YYYY-MM-DD (default: today)
    #[arg(long)]
    date: Option<String>,
}

#[derive(Subcommand)]
pub enum EventAction {
    /// Add a fixed appointment
    AddAppointment(EventSpec),
    /// Add an anchor (ritual or practice block)
    AddAnchor(EventSpec),
    /// List appointments and anchors for a day
    List {
        /// Day, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn add(ctx: &Context, spec: EventSpec, kind: BusyKind) -> Result<(), Box<dyn std::error::Error>> {
    let date = ctx.date_or_today(spec.date.as_deref())?;
    let start = ctx.instant(date, &spec.start)?;
    let end = ctx.instant(date, &spec.end)?;
    if end <= start {
        return Err(format!("end {} must be after start {}", spec.end, spec.start).into());
    }
    let id = ctx
        .db
        .add_obligation(ctx.user(), &spec.title, &BusyInterval::new(start, end, kind))?;
    println!("Event created: {id}");
    Ok(())
}

pub fn run(action: EventAction) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::load()?;

    match action {
        EventAction::AddAppointment(spec) => add(&ctx, spec, BusyKind::Appointment)?,
        EventAction::AddAnchor(spec) => add(&ctx, spec, BusyKind::Anchor)?,
        EventAction::List { date, json } => {
            let date = ctx.date_or_today(date.as_deref())?;
            let from = start_of_day(date, &ctx.tz);
            let events = ctx
                .db
                .list_obligations(ctx.user(), from, from + Duration::days(1))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&events)?);
            } else if events.is_empty() {
                println!("No events on {date}.");
            } else {
                for event in &events {
                    let kind = match event.kind {
                        BusyKind::Anchor => "anchor",
                        _ => "appointment",
                    };
                    println!(
                        "{}-{}  {:<11}  {}  [{}]",
                        ctx.clock(event.start),
                        ctx.clock(event.end),
                        kind,
                        event.title,
                        event.id
                    );
                }
            }
        }
    }
    Ok(())
}
