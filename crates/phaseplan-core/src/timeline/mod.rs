//! Timeline availability.
//!
//! This module provides:
//! - Obligation collection (appointments, anchors, sleep, work hours)
//! - Free-slot detection with midpoint phase tagging

mod gap;
mod obligations;

pub use gap::{FreeSlot, FreeSlotFinder, PhaseCalendar, MIN_SLOT_MINUTES};
pub use obligations::{collect_obligations, sleep_intervals, work_interval};
