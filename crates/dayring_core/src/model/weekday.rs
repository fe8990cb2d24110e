//! Weekday tokens and recurring frequency sets.
//!
//! # Responsibility
//! - Define the closed seven-day enumeration used by recurrence checks.
//! - Normalize free-text weekday tokens once, at the storage/input boundary.
//!
//! # Invariants
//! - Canonical token form is lowercase English day name.
//! - A `Frequency` is a set: duplicates collapse, order is Sunday..Saturday.
//! - Unknown tokens are dropped and reported, never raised as errors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// Day of week as stored in event frequencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Sunday,
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
    ];

    /// Canonical lowercase token.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sunday => "sunday",
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
            Self::Saturday => "saturday",
        }
    }

    /// Parses one token, ignoring case and surrounding whitespace.
    ///
    /// Returns `None` for anything that is not a full English day name.
    pub fn from_token(token: &str) -> Option<Self> {
        let normalized = token.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|day| day.as_str() == normalized.as_str())
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(value: chrono::Weekday) -> Self {
        match value {
            chrono::Weekday::Sun => Self::Sunday,
            chrono::Weekday::Mon => Self::Monday,
            chrono::Weekday::Tue => Self::Tuesday,
            chrono::Weekday::Wed => Self::Wednesday,
            chrono::Weekday::Thu => Self::Thursday,
            chrono::Weekday::Fri => Self::Friday,
            chrono::Weekday::Sat => Self::Saturday,
        }
    }
}

impl Display for Weekday {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A frequency token or value that could not be understood.
///
/// Purely diagnostic: the offending token is dropped from the set and the
/// event simply does not ring on that (non-)day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedFrequencyEntry {
    /// Token is not one of the seven canonical day names.
    UnknownToken(String),
    /// Stored value looked like JSON but was not an array of tokens.
    NotATokenList(String),
}

impl Display for MalformedFrequencyEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownToken(token) => write!(f, "unknown weekday token `{token}`"),
            Self::NotATokenList(raw) => write!(f, "frequency value `{raw}` is not a token list"),
        }
    }
}

/// Set of weekdays on which a recurring event rings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frequency(BTreeSet<Weekday>);

/// Result of normalizing raw frequency text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFrequency {
    pub frequency: Frequency,
    pub malformed: Vec<MalformedFrequencyEntry>,
}

impl Frequency {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_days(days: impl IntoIterator<Item = Weekday>) -> Self {
        Self(days.into_iter().collect())
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0.contains(&day)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        self.0.iter().copied()
    }

    /// Normalizes raw frequency text from storage or operator input.
    ///
    /// Accepts a JSON array of strings (`["Monday","friday"]`) or a comma
    /// separated list (`monday, friday`). Unknown tokens are collected in
    /// `malformed`; an unparsable JSON value yields the empty set.
    pub fn parse(raw: &str) -> ParsedFrequency {
        let trimmed = raw.trim();
        let mut parsed = ParsedFrequency::default();
        if trimmed.is_empty() {
            return parsed;
        }

        if trimmed.starts_with('[') {
            match serde_json::from_str::<Vec<serde_json::Value>>(trimmed) {
                Ok(values) => {
                    for value in values {
                        match value.as_str() {
                            Some(token) => parsed.push_token(token),
                            None => parsed
                                .malformed
                                .push(MalformedFrequencyEntry::UnknownToken(value.to_string())),
                        }
                    }
                }
                Err(_) => parsed
                    .malformed
                    .push(MalformedFrequencyEntry::NotATokenList(trimmed.to_string())),
            }
            return parsed;
        }

        for token in trimmed.split(',').filter(|token| !token.trim().is_empty()) {
            parsed.push_token(token);
        }
        parsed
    }

    /// Storage form: JSON array of canonical tokens.
    pub fn to_stored(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl ParsedFrequency {
    fn push_token(&mut self, token: &str) {
        match Weekday::from_token(token) {
            Some(day) => {
                self.frequency.0.insert(day);
            }
            None => self
                .malformed
                .push(MalformedFrequencyEntry::UnknownToken(token.trim().to_string())),
        }
    }
}

impl FromIterator<Weekday> for Frequency {
    fn from_iter<T: IntoIterator<Item = Weekday>>(iter: T) -> Self {
        Self::from_days(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::{Frequency, MalformedFrequencyEntry, Weekday};

    #[test]
    fn from_token_is_case_insensitive_and_trims() {
        assert_eq!(Weekday::from_token(" Monday "), Some(Weekday::Monday));
        assert_eq!(Weekday::from_token("SATURDAY"), Some(Weekday::Saturday));
        assert_eq!(Weekday::from_token("mon"), None);
        assert_eq!(Weekday::from_token(""), None);
    }

    #[test]
    fn converts_from_chrono_weekday() {
        assert_eq!(Weekday::from(chrono::Weekday::Wed), Weekday::Wednesday);
        assert_eq!(Weekday::from(chrono::Weekday::Sun), Weekday::Sunday);
    }

    #[test]
    fn parse_accepts_json_array_and_dedupes() {
        let parsed = Frequency::parse(r#"["Monday", "wednesday", "MONDAY"]"#);
        assert!(parsed.malformed.is_empty());
        assert_eq!(parsed.frequency.len(), 2);
        assert!(parsed.frequency.contains(Weekday::Monday));
        assert!(parsed.frequency.contains(Weekday::Wednesday));
    }

    #[test]
    fn parse_accepts_comma_list() {
        let parsed = Frequency::parse("friday, Saturday,,");
        assert!(parsed.malformed.is_empty());
        assert_eq!(
            parsed.frequency,
            Frequency::from_days([Weekday::Friday, Weekday::Saturday])
        );
    }

    #[test]
    fn parse_drops_unknown_tokens_and_reports_them() {
        let parsed = Frequency::parse(r#"["monday", "someday", 3]"#);
        assert_eq!(parsed.frequency, Frequency::from_days([Weekday::Monday]));
        assert_eq!(
            parsed.malformed,
            vec![
                MalformedFrequencyEntry::UnknownToken("someday".to_string()),
                MalformedFrequencyEntry::UnknownToken("3".to_string()),
            ]
        );
    }

    #[test]
    fn parse_degrades_broken_json_to_empty_set() {
        let parsed = Frequency::parse("[\"monday\"");
        assert!(parsed.frequency.is_empty());
        assert!(matches!(
            parsed.malformed.as_slice(),
            [MalformedFrequencyEntry::NotATokenList(_)]
        ));
    }

    #[test]
    fn stored_form_is_canonical_and_reparses() {
        let frequency = Frequency::from_days([Weekday::Saturday, Weekday::Monday]);
        let stored = frequency.to_stored().unwrap();
        assert_eq!(stored, r#"["monday","saturday"]"#);
        assert_eq!(Frequency::parse(&stored).frequency, frequency);
        assert_eq!(Frequency::empty().to_stored().unwrap(), "[]");
    }
}
