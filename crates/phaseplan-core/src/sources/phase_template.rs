//! Phase source backed by fixed daily templates.

use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use super::PhaseSource;
use crate::error::Result;
use crate::schedule::Phase;
use crate::time_window::{at_minutes, parse_hhmm, MINUTES_PER_DAY};

/// A phase repeating every day between two local times.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseTemplate {
    pub name: String,
    pub start: String, // HH:mm
    pub end: String,   // HH:mm, may be earlier than start to wrap midnight
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl PhaseTemplate {
    pub fn new(name: &str, start: &str, end: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            start: start.to_string(),
            end: end.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            color: None,
        }
    }

    pub fn with_color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        self
    }

    /// Concrete phases on `date`. A template wrapping midnight yields its
    /// early-morning tail and its evening head, both clipped to the day.
    pub fn instantiate(&self, date: NaiveDate, tz: &FixedOffset) -> Vec<Phase> {
        let (start, end) = match (parse_hhmm(&self.start), parse_hhmm(&self.end)) {
            (Ok(s), Ok(e)) => (s, e),
            _ => {
                tracing::warn!(phase = %self.name, "ignoring phase template with invalid times");
                return Vec::new();
            }
        };

        let make = |from: u32, to: u32| Phase {
            name: self.name.clone(),
            start: at_minutes(date, from, tz),
            end: at_minutes(date, to, tz),
            ideal_task_keywords: self.keywords.clone(),
            color: self.color.clone(),
        };

        if start < end {
            vec![make(start, end)]
        } else if start > end {
            let mut parts = Vec::with_capacity(2);
            if end > 0 {
                parts.push(make(0, end));
            }
            if start < MINUTES_PER_DAY {
                parts.push(make(start, MINUTES_PER_DAY));
            }
            parts
        } else {
            Vec::new()
        }
    }
}

/// The phase set shipped with a fresh configuration.
pub fn default_phase_templates() -> Vec<PhaseTemplate> {
    vec![
        PhaseTemplate::new("Dawn", "05:00", "08:00", &["exercise", "meditation", "planning"])
            .with_color("#f59e0b"),
        PhaseTemplate::new(
            "Morning focus",
            "08:00",
            "12:00",
            &["deep work", "writing", "coding", "study"],
        )
        .with_color("#3b82f6"),
        PhaseTemplate::new("Afternoon", "12:00", "17:00", &["meetings", "admin", "errands", "email"])
            .with_color("#10b981"),
        PhaseTemplate::new("Evening", "17:00", "21:00", &["exercise", "social", "chores", "reading"])
            .with_color("#8b5cf6"),
        PhaseTemplate::new("Night", "21:00", "05:00", &["reading", "reflection", "journaling"])
            .with_color("#1e293b"),
    ]
}

/// Phase source that stamps the same templates onto every date.
#[derive(Debug, Clone)]
pub struct TemplatePhaseSource {
    templates: Vec<PhaseTemplate>,
    tz: FixedOffset,
}

impl TemplatePhaseSource {
    pub fn new(templates: Vec<PhaseTemplate>, tz: FixedOffset) -> Self {
        Self { templates, tz }
    }

    /// Phases for `date`, ordered by start.
    pub fn phases_on(&self, date: NaiveDate) -> Vec<Phase> {
        let mut phases: Vec<Phase> = self
            .templates
            .iter()
            .flat_map(|t| t.instantiate(date, &self.tz))
            .collect();
        phases.sort_by_key(|p| p.start);
        phases
    }
}

#[async_trait]
impl PhaseSource for TemplatePhaseSource {
    async fn phases_for_date(&self, date: NaiveDate) -> Result<Vec<Phase>> {
        Ok(self.phases_on(date))
    }
}
