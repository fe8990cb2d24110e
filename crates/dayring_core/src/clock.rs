//! Current-date source for projections.
//!
//! The engine never reads the system time directly; it asks a `Clock`, so
//! tests can pin "today" to any date.

use crate::model::weekday::Weekday;
use chrono::{Datelike, Local, NaiveDate};
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    /// Current calendar date in the local zone.
    fn today(&self) -> NaiveDate;

    /// Weekday of [`Clock::today`].
    fn today_weekday(&self) -> Weekday {
        self.today().weekday().into()
    }
}

/// Local system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Settable clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    today: Mutex<NaiveDate>,
}

impl FixedClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today: Mutex::new(today),
        }
    }

    pub fn set(&self, today: NaiveDate) {
        match self.today.lock() {
            Ok(mut guard) => *guard = today,
            Err(poisoned) => *poisoned.into_inner() = today,
        }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        match self.today.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn today(&self) -> NaiveDate {
        (**self).today()
    }

    fn today_weekday(&self) -> Weekday {
        (**self).today_weekday()
    }
}
