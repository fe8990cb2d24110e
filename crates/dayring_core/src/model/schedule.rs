//! Device-facing schedule records.
//!
//! # Invariants
//! - Entries have no identity outside the projection run that built them.
//! - Special entries always carry `delay = 0`.

use super::event::{NormalEvent, SpecialEvent};
use super::time::TimeOfDay;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Identifier of one resync's published snapshot.
pub type RunId = Uuid;

/// Source table an entry was projected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleSource {
    Normal,
    Special,
}

impl ScheduleSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Special => "special",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "normal" => Some(Self::Normal),
            "special" => Some(Self::Special),
            _ => None,
        }
    }
}

impl Display for ScheduleSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row the device reads and rings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceScheduleEntry {
    pub title: String,
    pub time: TimeOfDay,
    pub delay: i64,
    pub source: ScheduleSource,
}

impl DeviceScheduleEntry {
    pub fn from_normal(event: &NormalEvent) -> Self {
        Self {
            title: event.title.clone(),
            time: event.time,
            delay: event.delay,
            source: ScheduleSource::Normal,
        }
    }

    pub fn from_special(event: &SpecialEvent) -> Self {
        Self {
            title: event.description.clone(),
            time: event.time,
            delay: 0,
            source: ScheduleSource::Special,
        }
    }
}

/// Complete replacement set produced by one projection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSnapshot {
    pub run_id: RunId,
    pub synced_for: NaiveDate,
    pub entries: Vec<DeviceScheduleEntry>,
}

/// Publication record stored alongside the entries of the last run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleStatus {
    pub run_id: RunId,
    pub synced_for: NaiveDate,
    pub entry_count: usize,
    /// Unix epoch milliseconds.
    pub synced_at_ms: i64,
}
