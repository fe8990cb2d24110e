//! Core services.
//!
//! # Responsibility
//! - `projection`: rebuild and publish today's device schedule.
//! - `trigger`: decide when the projection runs and keep runs serialized.

pub mod projection;
pub mod trigger;
