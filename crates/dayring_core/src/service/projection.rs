//! Projection of today's ringing events into the device schedule.
//!
//! # Responsibility
//! - Read both event sources, apply the weekday test and the date test.
//! - Build the complete replacement set and hand it to the schedule store in
//!   one call.
//!
//! # Invariants
//! - Every run recomputes from scratch; there is no incremental patching.
//! - Runs with unchanged inputs publish equal entry sets.
//! - A failed run publishes nothing; the prior schedule stays visible.

use crate::clock::Clock;
use crate::model::event::{NormalEvent, SpecialEvent};
use crate::model::schedule::{
    DeviceScheduleEntry, RunId, ScheduleSnapshot, ScheduleSource, ScheduleStatus,
};
use crate::model::weekday::Weekday;
use crate::recurrence::normal_event_rings_today;
use crate::repo::event_repo::EventSource;
use crate::repo::schedule_repo::DeviceScheduleStore;
use crate::repo::{RepoError, RepoResult};
use chrono::{Datelike, NaiveDate};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

/// Step of a resync that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    LoadNormalEvents,
    LoadSpecialEvents,
    PublishSchedule,
}

impl SyncStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoadNormalEvents => "load_normal_events",
            Self::LoadSpecialEvents => "load_special_events",
            Self::PublishSchedule => "publish_schedule",
        }
    }
}

impl Display for SyncStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of one resync attempt. The previous schedule is still published.
#[derive(Debug)]
pub enum SyncError {
    StoreUnavailable { stage: SyncStage, source: RepoError },
    /// The blocking worker running the resync died before reporting.
    Worker(String),
}

impl SyncError {
    /// Stable code used in log lines.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::Worker(_) => "resync_worker_failed",
        }
    }

    fn at(stage: SyncStage) -> impl FnOnce(RepoError) -> Self {
        move |source| Self::StoreUnavailable { stage, source }
    }
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoreUnavailable { stage, source } => {
                write!(f, "store unavailable during {stage}: {source}")
            }
            Self::Worker(message) => write!(f, "resync worker failed: {message}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StoreUnavailable { source, .. } => Some(source),
            Self::Worker(_) => None,
        }
    }
}

/// Builds the replacement schedule for `today` from already loaded events.
///
/// Pure: inactive, non-matching, completed and off-date events are filtered
/// here as well, so callers may pass unfiltered lists.
pub fn build_snapshot(
    run_id: RunId,
    today: NaiveDate,
    weekday: Weekday,
    normal_events: &[NormalEvent],
    special_events: &[SpecialEvent],
) -> ScheduleSnapshot {
    let entries = normal_events
        .iter()
        .filter(|event| normal_event_rings_today(event, weekday))
        .map(DeviceScheduleEntry::from_normal)
        .chain(
            special_events
                .iter()
                .filter(|event| event.is_due_on(today))
                .map(DeviceScheduleEntry::from_special),
        )
        .collect();

    ScheduleSnapshot {
        run_id,
        synced_for: today,
        entries,
    }
}

/// The single writer of the device schedule.
pub struct ProjectionService<E, S, C> {
    events: E,
    schedule: S,
    clock: C,
}

impl<E: EventSource, S: DeviceScheduleStore, C: Clock> ProjectionService<E, S, C> {
    pub fn new(events: E, schedule: S, clock: C) -> Self {
        Self {
            events,
            schedule,
            clock,
        }
    }

    /// Resyncs for the clock's current date.
    pub fn resync(&self) -> Result<usize, SyncError> {
        // One clock read, so date and weekday cannot straddle midnight.
        let today = self.clock.today();
        self.resync_for(today, today.weekday().into())
    }

    /// Recomputes and atomically republishes the schedule for `today`.
    ///
    /// Returns the number of published entries; zero is a valid outcome.
    pub fn resync_for(&self, today: NaiveDate, weekday: Weekday) -> Result<usize, SyncError> {
        let run_id = Uuid::new_v4();
        let started_at = Instant::now();
        info!(
            "event=schedule_resync module=projection status=start run_id={} date={} weekday={}",
            run_id, today, weekday
        );

        match self.project(run_id, today, weekday) {
            Ok(counts) => {
                info!(
                    "event=schedule_resync module=projection status=ok run_id={} normal_count={} special_count={} duration_ms={}",
                    run_id,
                    counts.normal,
                    counts.special,
                    started_at.elapsed().as_millis()
                );
                Ok(counts.normal + counts.special)
            }
            Err(err) => {
                error!(
                    "event=schedule_resync module=projection status=error run_id={} duration_ms={} error_code={} error={}",
                    run_id,
                    started_at.elapsed().as_millis(),
                    err.error_code(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Entries the device currently sees, in ring order.
    pub fn list_device_schedule(&self) -> RepoResult<Vec<DeviceScheduleEntry>> {
        self.schedule.list_device_schedule()
    }

    pub fn schedule_status(&self) -> RepoResult<Option<ScheduleStatus>> {
        self.schedule.schedule_status()
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    fn project(
        &self,
        run_id: RunId,
        today: NaiveDate,
        weekday: Weekday,
    ) -> Result<ProjectedCounts, SyncError> {
        let normal_events = self
            .events
            .list_active_normal_events()
            .map_err(SyncError::at(SyncStage::LoadNormalEvents))?;
        let special_events = self
            .events
            .list_special_events(today, false)
            .map_err(SyncError::at(SyncStage::LoadSpecialEvents))?;

        let snapshot = build_snapshot(run_id, today, weekday, &normal_events, &special_events);
        let special = snapshot
            .entries
            .iter()
            .filter(|entry| entry.source == ScheduleSource::Special)
            .count();
        let published = self
            .schedule
            .replace_schedule(&snapshot)
            .map_err(SyncError::at(SyncStage::PublishSchedule))?;

        Ok(ProjectedCounts {
            normal: published.saturating_sub(special),
            special,
        })
    }
}

struct ProjectedCounts {
    normal: usize,
    special: usize,
}

#[cfg(test)]
mod tests {
    use super::build_snapshot;
    use crate::model::event::{NormalEvent, SpecialEvent};
    use crate::model::schedule::ScheduleSource;
    use crate::model::time::TimeOfDay;
    use crate::model::weekday::{Frequency, Weekday};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn normal(id: i64, title: &str, days: &[Weekday], active: bool) -> NormalEvent {
        NormalEvent {
            id,
            title: title.to_string(),
            time: TimeOfDay::new(7, 0).unwrap(),
            delay: 120,
            tone: "bell".to_string(),
            active,
            frequency: Frequency::from_days(days.iter().copied()),
        }
    }

    fn special(id: i64, date: NaiveDate, completed: bool) -> SpecialEvent {
        SpecialEvent {
            id,
            date,
            time: TimeOfDay::new(8, 0).unwrap(),
            description: format!("special-{id}"),
            tone: "chime".to_string(),
            completed,
        }
    }

    #[test]
    fn snapshot_keeps_only_events_ringing_today() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let normals = [
            normal(1, "monday", &[Weekday::Monday], true),
            normal(2, "inactive", &[Weekday::Monday], false),
            normal(3, "tuesday", &[Weekday::Tuesday], true),
            normal(4, "never", &[], true),
        ];
        let specials = [
            special(1, today, false),
            special(2, today, true),
            special(3, today.succ_opt().unwrap(), false),
        ];

        let snapshot = build_snapshot(Uuid::nil(), today, Weekday::Monday, &normals, &specials);

        let titles: Vec<&str> = snapshot.entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["monday", "special-1"]);
        assert_eq!(snapshot.synced_for, today);
    }

    #[test]
    fn special_entries_use_description_and_zero_delay() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let snapshot = build_snapshot(
            Uuid::nil(),
            today,
            Weekday::Monday,
            &[],
            &[special(9, today, false)],
        );

        let entry = &snapshot.entries[0];
        assert_eq!(entry.title, "special-9");
        assert_eq!(entry.delay, 0);
        assert_eq!(entry.source, ScheduleSource::Special);
    }

    #[test]
    fn normal_entries_pass_delay_through() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut event = normal(1, "odd", &[Weekday::Monday], true);
        event.delay = -42;
        let snapshot = build_snapshot(Uuid::nil(), today, Weekday::Monday, &[event], &[]);
        assert_eq!(snapshot.entries[0].delay, -42);
        assert_eq!(snapshot.entries[0].source, ScheduleSource::Normal);
    }
}
