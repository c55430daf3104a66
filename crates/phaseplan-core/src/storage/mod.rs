mod config;
pub mod schedule_db;

pub use config::Config;
pub use schedule_db::{ObligationRecord, ScheduleDb};

use std::path::PathBuf;

/// Returns `~/.config/phaseplan[-dev]/` based on PHASEPLAN_ENV.
///
/// Set PHASEPLAN_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("PHASEPLAN_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("phaseplan-dev")
    } else {
        base_dir.join("phaseplan")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
