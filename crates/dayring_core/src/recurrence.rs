//! Weekday recurrence check.
//!
//! Pure functions only. Malformed tokens were already dropped when the
//! frequency was normalized, so nothing here can fail.

use crate::model::event::NormalEvent;
use crate::model::weekday::{Frequency, Weekday};

/// Returns whether a frequency set includes `today`.
///
/// An empty set never rings.
pub fn rings_today(frequency: &Frequency, today: Weekday) -> bool {
    frequency.contains(today)
}

/// Returns whether a recurring event should be projected for `today`.
pub fn normal_event_rings_today(event: &NormalEvent, today: Weekday) -> bool {
    event.active && rings_today(&event.frequency, today)
}
