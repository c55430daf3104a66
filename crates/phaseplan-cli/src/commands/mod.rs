pub mod config;
pub mod event;
pub mod habit;
pub mod plan;
pub mod task;

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, Offset, Utc};
use phaseplan_core::time_window::{at_minutes, local_date, parse_hhmm};
use phaseplan_core::{Config, ScheduleDb};

/// Configuration, resolved time zone and database for one invocation.
pub struct Context {
    pub config: Config,
    pub tz: FixedOffset,
    pub db: Arc<ScheduleDb>,
}

impl Context {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::load()?;
        let tz = config.time_zone_or(Local::now().offset().fix());
        let db = ScheduleDb::open()?
            .with_profile(config.profile.clone())
            .with_phases(config.phases.clone(), tz);
        let db = Arc::new(db);
        tracing::debug!(user = %config.user, offset = tz.local_minus_utc(), "context loaded");
        Ok(Self { config, tz, db })
    }

    pub fn user(&self) -> &str {
        &self.config.user
    }

    pub fn today(&self) -> NaiveDate {
        local_date(Utc::now(), &self.tz)
    }

    /// `YYYY-MM-DD`, or today when absent.
    pub fn date_or_today(&self, date: Option<&str>) -> Result<NaiveDate, Box<dyn std::error::Error>> {
        match date {
            Some(d) => Ok(NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .map_err(|e| format!("invalid date '{d}': {e}"))?),
            None => Ok(self.today()),
        }
    }

    /// Local `HH:MM` on `date` as an instant.
    pub fn instant(&self, date: NaiveDate, hhmm: &str) -> Result<DateTime<Utc>, Box<dyn std::error::Error>> {
        Ok(at_minutes(date, parse_hhmm(hhmm)?, &self.tz))
    }

    /// Local wall-clock rendering of an instant.
    pub fn clock(&self, instant: DateTime<Utc>) -> String {
        instant.with_timezone(&self.tz).format("%H:%M").to_string()
    }
}

/// Split a comma-separated list, dropping empty entries.
pub fn split_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
