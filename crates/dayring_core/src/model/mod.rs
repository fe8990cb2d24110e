//! Domain model for source events and the derived device schedule.
//!
//! # Responsibility
//! - Define the records read by the projection engine and the rows it publishes.
//! - Own the normalization of weekday tokens and time/date text.
//!
//! # Invariants
//! - Source events are identified by store-assigned integer ids.
//! - Device schedule rows are derived and carry no identity of their own.

pub mod event;
pub mod schedule;
pub mod time;
pub mod weekday;
