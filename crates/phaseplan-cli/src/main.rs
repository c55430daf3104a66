use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "phaseplan-cli", version, about = "Phase-aware day planner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Task management
    Task {
        #[command(subcommand)]
        action: commands::task::TaskAction,
    },
    /// Habit management
    Habit {
        #[command(subcommand)]
        action: commands::habit::HabitAction,
    },
    /// Appointments and anchors
    Event {
        #[command(subcommand)]
        action: commands::event::EventAction,
    },
    /// Build and inspect plans
    Plan {
        #[command(subcommand)]
        action: commands::plan::PlanAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

/// Log to stderr, filtered by PHASEPLAN_LOG, then RUST_LOG, then `warn`.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("PHASEPLAN_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Task { action } => commands::task::run(action),
        Commands::Habit { action } => commands::habit::run(action),
        Commands::Event { action } => commands::event::run(action),
        Commands::Plan { action } => commands::plan::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
