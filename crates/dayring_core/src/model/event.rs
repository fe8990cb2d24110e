//! Source-of-truth event records.
//!
//! # Responsibility
//! - Define recurring (`NormalEvent`) and one-off (`SpecialEvent`) records.
//! - Validate fields before persistence and after loading.
//!
//! # Invariants
//! - `id` is assigned by the store and never reused for another event.
//! - `delay` is opaque: carried to the device unchanged, never interpreted.
//! - A completed special event never rings again, whatever its date.

use super::time::TimeOfDay;
use super::weekday::Frequency;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned event identifier.
pub type EventId = i64;

/// Which source table an event lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Normal,
    Special,
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => f.write_str("normal event"),
            Self::Special => f.write_str("special event"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventValidationError {
    EmptyTitle,
    EmptyDescription,
    EmptyTone,
    InvalidTime(String),
    InvalidDate(String),
}

impl Display for EventValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "event title cannot be empty"),
            Self::EmptyDescription => write!(f, "special event description cannot be empty"),
            Self::EmptyTone => write!(f, "event tone cannot be empty"),
            Self::InvalidTime(value) => {
                write!(f, "invalid time of day `{value}`; expected HH:MM")
            }
            Self::InvalidDate(value) => write!(f, "invalid date `{value}`; expected YYYY-MM-DD"),
        }
    }
}

impl Error for EventValidationError {}

/// Recurring notification that rings on every listed weekday while active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalEvent {
    pub id: EventId,
    pub title: String,
    pub time: TimeOfDay,
    pub delay: i64,
    pub tone: String,
    pub active: bool,
    pub frequency: Frequency,
}

/// Insert payload for a recurring event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNormalEvent {
    pub title: String,
    pub time: TimeOfDay,
    pub delay: i64,
    pub tone: String,
    pub active: bool,
    pub frequency: Frequency,
}

/// One-off notification bound to a calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialEvent {
    pub id: EventId,
    pub date: NaiveDate,
    pub time: TimeOfDay,
    /// Shown on the device as the entry title.
    pub description: String,
    pub tone: String,
    pub completed: bool,
}

/// Insert payload for a one-off event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSpecialEvent {
    pub date: NaiveDate,
    pub time: TimeOfDay,
    pub description: String,
    pub tone: String,
    pub completed: bool,
}

impl NewNormalEvent {
    pub fn validate(&self) -> Result<(), EventValidationError> {
        validate_text(&self.title, EventValidationError::EmptyTitle)?;
        validate_text(&self.tone, EventValidationError::EmptyTone)
    }

    /// Attaches the store-assigned id.
    pub fn with_id(self, id: EventId) -> NormalEvent {
        NormalEvent {
            id,
            title: self.title,
            time: self.time,
            delay: self.delay,
            tone: self.tone,
            active: self.active,
            frequency: self.frequency,
        }
    }
}

impl NormalEvent {
    pub fn validate(&self) -> Result<(), EventValidationError> {
        validate_text(&self.title, EventValidationError::EmptyTitle)?;
        validate_text(&self.tone, EventValidationError::EmptyTone)
    }
}

impl NewSpecialEvent {
    pub fn validate(&self) -> Result<(), EventValidationError> {
        validate_text(&self.description, EventValidationError::EmptyDescription)?;
        validate_text(&self.tone, EventValidationError::EmptyTone)
    }

    pub fn with_id(self, id: EventId) -> SpecialEvent {
        SpecialEvent {
            id,
            date: self.date,
            time: self.time,
            description: self.description,
            tone: self.tone,
            completed: self.completed,
        }
    }
}

impl SpecialEvent {
    pub fn validate(&self) -> Result<(), EventValidationError> {
        validate_text(&self.description, EventValidationError::EmptyDescription)?;
        validate_text(&self.tone, EventValidationError::EmptyTone)
    }

    /// Whether this event should be projected onto `date`.
    pub fn is_due_on(&self, date: NaiveDate) -> bool {
        !self.completed && self.date == date
    }
}

fn validate_text(value: &str, error: EventValidationError) -> Result<(), EventValidationError> {
    if value.trim().is_empty() {
        return Err(error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{EventValidationError, NewNormalEvent, NewSpecialEvent};
    use crate::model::time::{parse_event_date, TimeOfDay};
    use crate::model::weekday::Frequency;

    fn special(date: &str, completed: bool) -> NewSpecialEvent {
        NewSpecialEvent {
            date: parse_event_date(date).unwrap(),
            time: TimeOfDay::new(8, 0).unwrap(),
            description: "Doctor".to_string(),
            tone: "chime".to_string(),
            completed,
        }
    }

    #[test]
    fn normal_event_requires_title_and_tone() {
        let mut event = NewNormalEvent {
            title: "  ".to_string(),
            time: TimeOfDay::new(7, 0).unwrap(),
            delay: 0,
            tone: "bell".to_string(),
            active: true,
            frequency: Frequency::empty(),
        };
        assert_eq!(event.validate(), Err(EventValidationError::EmptyTitle));

        event.title = "Wake".to_string();
        event.tone = String::new();
        assert_eq!(event.validate(), Err(EventValidationError::EmptyTone));
    }

    #[test]
    fn special_event_requires_description() {
        let mut event = special("2024-01-01", false);
        event.description = "\n".to_string();
        assert_eq!(event.validate(), Err(EventValidationError::EmptyDescription));
    }

    #[test]
    fn special_event_is_due_only_on_its_date_while_open() {
        let day = parse_event_date("2024-01-01").unwrap();
        let next_day = parse_event_date("2024-01-02").unwrap();

        let open = special("2024-01-01", false).with_id(1);
        assert!(open.is_due_on(day));
        assert!(!open.is_due_on(next_day));

        let done = special("2024-01-01", true).with_id(2);
        assert!(!done.is_due_on(day));
    }
}
