//! Local wall-clock time and calendar date helpers.

use super::event::EventValidationError;
use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const TIME_FORMAT: &str = "%H:%M";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// `HH:MM` time of day in the single implicit local zone.
///
/// Always rendered zero-padded so text order equals chronological order,
/// which the device schedule relies on when sorting in SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }
}

impl FromStr for TimeOfDay {
    type Err = EventValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(value.trim(), TIME_FORMAT)
            .map(Self)
            .map_err(|_| EventValidationError::InvalidTime(value.to_string()))
    }
}

impl Display for TimeOfDay {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(TIME_FORMAT))
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// Parses a `YYYY-MM-DD` calendar date.
pub fn parse_event_date(value: &str) -> Result<NaiveDate, EventValidationError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| EventValidationError::InvalidDate(value.to_string()))
}

/// Storage form of a calendar date.
pub fn format_event_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::{format_event_date, parse_event_date, TimeOfDay};

    #[test]
    fn time_of_day_pads_single_digit_hours() {
        let time: TimeOfDay = "7:05".parse().unwrap();
        assert_eq!(time.to_string(), "07:05");
        assert_eq!((time.hour(), time.minute()), (7, 5));
    }

    #[test]
    fn time_of_day_rejects_out_of_range_and_seconds() {
        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("07:60".parse::<TimeOfDay>().is_err());
        assert!("07:00:00".parse::<TimeOfDay>().is_err());
        assert!("seven".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn time_of_day_orders_chronologically() {
        let early = TimeOfDay::new(7, 30).unwrap();
        let late = TimeOfDay::new(9, 0).unwrap();
        assert!(early < late);
    }

    #[test]
    fn time_of_day_serializes_as_string() {
        let time = TimeOfDay::new(8, 0).unwrap();
        assert_eq!(serde_json::to_string(&time).unwrap(), "\"08:00\"");
        let back: TimeOfDay = serde_json::from_str("\"08:00\"").unwrap();
        assert_eq!(back, time);
    }

    #[test]
    fn event_date_roundtrips_through_storage_form() {
        let date = parse_event_date("2024-01-02").unwrap();
        assert_eq!(format_event_date(date), "2024-01-02");
        assert!(parse_event_date("2024-13-01").is_err());
    }
}
