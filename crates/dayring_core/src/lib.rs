//! Core of dayring: event store, recurrence check and the projection engine
//! that publishes today's ringing schedule for the polling device.
//! This crate owns every invariant of the published schedule.

pub mod clock;
pub mod db;
pub mod logging;
pub mod model;
pub mod recurrence;
pub mod repo;
pub mod service;

pub use clock::{Clock, FixedClock, SystemClock};
pub use db::SharedConnection;
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig};
pub use model::event::{
    EventId, EventKind, EventValidationError, NewNormalEvent, NewSpecialEvent, NormalEvent,
    SpecialEvent,
};
pub use model::schedule::{
    DeviceScheduleEntry, RunId, ScheduleSnapshot, ScheduleSource, ScheduleStatus,
};
pub use model::time::TimeOfDay;
pub use model::weekday::{Frequency, MalformedFrequencyEntry, ParsedFrequency, Weekday};
pub use recurrence::rings_today;
pub use repo::event_repo::{EventRepository, EventSource, SqliteEventRepository};
pub use repo::schedule_repo::{DeviceScheduleStore, SqliteScheduleRepository};
pub use repo::{RepoError, RepoResult};
pub use service::projection::{build_snapshot, ProjectionService, SyncError, SyncStage};
pub use service::trigger::{
    ScheduleResync, ScheduleTrigger, TriggerConfig, TriggerHandle, TriggerStats,
    DEFAULT_RESYNC_INTERVAL,
};

/// Projection service over the SQLite stores.
pub type SqliteProjectionService<C> =
    ProjectionService<SqliteEventRepository, SqliteScheduleRepository, C>;

/// Wires the SQLite stores on `conn` into a projection service.
pub fn sqlite_projection<C: Clock>(
    conn: &SharedConnection,
    clock: C,
) -> RepoResult<SqliteProjectionService<C>> {
    let events = SqliteEventRepository::try_new(conn.clone())?;
    let schedule = SqliteScheduleRepository::try_new(conn.clone())?;
    Ok(ProjectionService::new(events, schedule, clock))
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
