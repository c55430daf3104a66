//! Phase fit scoring.
//!
//! Additive and never negative: a phase that suits nothing about the item
//! simply earns no bonus.

use super::item::SchedulableItem;
use crate::schedule::Phase;

pub const BASELINE: f64 = 1.0;
pub const KEYWORD_BONUS: f64 = 0.5;
pub const IDEAL_PHASE_BONUS: f64 = 2.0;

/// How well `item` fits a slot in `phase`.
pub fn suitability(item: &SchedulableItem, phase: Option<&Phase>) -> f64 {
    let Some(phase) = phase else {
        return BASELINE;
    };

    let matches = item
        .keywords
        .iter()
        .filter(|k| {
            phase
                .ideal_task_keywords
                .iter()
                .any(|p| p.eq_ignore_ascii_case(k))
        })
        .count();

    let ideal = match &item.ideal_phase {
        Some(name) if *name == phase.name => IDEAL_PHASE_BONUS,
        _ => 0.0,
    };

    BASELINE + KEYWORD_BONUS * matches as f64 + ideal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::item::ItemKind;
    use crate::schedule::WeekdaySet;
    use chrono::Utc;

    fn item(keywords: &[&str], ideal: Option<&str>) -> SchedulableItem {
        SchedulableItem {
            kind: ItemKind::Task,
            source_id: "i".into(),
            title: "i".into(),
            priority_score: 0,
            remaining_minutes: 30,
            min_chunk_minutes: 15,
            max_chunk_minutes: 60,
            allowed_days: WeekdaySet::ALL,
            ideal_phase: ideal.map(str::to_string),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn phase(name: &str, keywords: &[&str]) -> Phase {
        let now = Utc::now();
        Phase {
            name: name.into(),
            start: now,
            end: now,
            ideal_task_keywords: keywords.iter().map(|k| k.to_string()).collect(),
            color: None,
        }
    }

    #[test]
    fn no_phase_is_neutral() {
        assert_eq!(suitability(&item(&["coding"], Some("Dawn")), None), 1.0);
    }

    #[test]
    fn keyword_matches_add_half_point_each() {
        let p = phase("Morning", &["coding", "Writing", "study"]);
        assert_eq!(suitability(&item(&["coding", "writing"], None), Some(&p)), 2.0);
        assert_eq!(suitability(&item(&["gardening"], None), Some(&p)), 1.0);
    }

    #[test]
    fn ideal_phase_adds_flat_bonus() {
        let p = phase("Dawn", &["exercise"]);
        assert_eq!(suitability(&item(&["exercise"], Some("Dawn")), Some(&p)), 3.5);
        assert_eq!(suitability(&item(&[], Some("Night")), Some(&p)), 1.0);
    }
}
