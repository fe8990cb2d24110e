use chrono::NaiveDate;
use dayring_core::{
    sqlite_projection, DeviceScheduleEntry, EventRepository, EventSource, FixedClock, Frequency,
    NewNormalEvent, NewSpecialEvent, NormalEvent, ProjectionService, RepoError, RepoResult,
    ScheduleSource, SharedConnection, SpecialEvent, SqliteEventRepository,
    SqliteProjectionService, SqliteScheduleRepository, SyncError, SyncStage, Weekday,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

// 2024-01-01 was a Monday.
const MONDAY: (i32, u32, u32) = (2024, 1, 1);
const WEDNESDAY: (i32, u32, u32) = (2024, 1, 3);

fn day((y, m, d): (i32, u32, u32)) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn setup(
    today: NaiveDate,
) -> (
    SharedConnection,
    SqliteEventRepository,
    Arc<FixedClock>,
    SqliteProjectionService<Arc<FixedClock>>,
) {
    let conn = SharedConnection::open_in_memory().unwrap();
    let events = SqliteEventRepository::try_new(conn.clone()).unwrap();
    let clock = Arc::new(FixedClock::new(today));
    let service = sqlite_projection(&conn, Arc::clone(&clock)).unwrap();
    (conn, events, clock, service)
}

fn normal(title: &str, time: &str, delay: i64, days: &[Weekday]) -> NewNormalEvent {
    NewNormalEvent {
        title: title.to_string(),
        time: time.parse().unwrap(),
        delay,
        tone: "bell".to_string(),
        active: true,
        frequency: Frequency::from_days(days.iter().copied()),
    }
}

fn special(description: &str, time: &str, date: NaiveDate, completed: bool) -> NewSpecialEvent {
    NewSpecialEvent {
        date,
        time: time.parse().unwrap(),
        description: description.to_string(),
        tone: "chime".to_string(),
        completed,
    }
}

fn entry(title: &str, time: &str, delay: i64, source: ScheduleSource) -> DeviceScheduleEntry {
    DeviceScheduleEntry {
        title: title.to_string(),
        time: time.parse().unwrap(),
        delay,
        source,
    }
}

#[test]
fn matching_monday_event_publishes_one_normal_entry() {
    let (_conn, events, _clock, service) = setup(day(MONDAY));
    events
        .create_normal_event(&normal("Standup", "09:30", 45, &[Weekday::Monday]))
        .unwrap();

    assert_eq!(service.resync().unwrap(), 1);
    assert_eq!(
        service.list_device_schedule().unwrap(),
        vec![entry("Standup", "09:30", 45, ScheduleSource::Normal)]
    );
}

#[test]
fn wake_and_doctor_end_to_end() {
    let today = day(WEDNESDAY);
    let (_conn, events, _clock, service) = setup(today);
    events
        .create_normal_event(&normal(
            "Wake",
            "07:00",
            300,
            &[Weekday::Monday, Weekday::Wednesday],
        ))
        .unwrap();
    service.resync().unwrap();
    assert_eq!(
        service.list_device_schedule().unwrap(),
        vec![entry("Wake", "07:00", 300, ScheduleSource::Normal)]
    );

    events
        .create_special_event(&special("Doctor", "08:00", today, false))
        .unwrap();
    assert_eq!(service.resync().unwrap(), 2);
    assert_eq!(
        service.list_device_schedule().unwrap(),
        vec![
            entry("Wake", "07:00", 300, ScheduleSource::Normal),
            entry("Doctor", "08:00", 0, ScheduleSource::Special),
        ]
    );
}

#[test]
fn schedule_is_sorted_by_time_of_day() {
    let today = day(MONDAY);
    let (_conn, events, _clock, service) = setup(today);
    events
        .create_normal_event(&normal("Late", "09:00", 0, &[Weekday::Monday]))
        .unwrap();
    events
        .create_special_event(&special("Early", "07:30", today, false))
        .unwrap();
    events
        .create_normal_event(&normal("Noon", "12:00", 0, &[Weekday::Monday]))
        .unwrap();

    service.resync().unwrap();

    let titles: Vec<String> = service
        .list_device_schedule()
        .unwrap()
        .into_iter()
        .map(|entry| entry.title)
        .collect();
    assert_eq!(titles, vec!["Early", "Late", "Noon"]);
}

#[test]
fn same_time_entries_keep_projection_order() {
    let today = day(MONDAY);
    let (_conn, events, _clock, service) = setup(today);
    events
        .create_special_event(&special("Bravo", "07:00", today, false))
        .unwrap();
    events
        .create_normal_event(&normal("Zulu", "07:00", 0, &[Weekday::Monday]))
        .unwrap();

    service.resync().unwrap();

    let sources: Vec<ScheduleSource> = service
        .list_device_schedule()
        .unwrap()
        .into_iter()
        .map(|entry| entry.source)
        .collect();
    assert_eq!(sources, vec![ScheduleSource::Normal, ScheduleSource::Special]);
}

#[test]
fn past_and_completed_special_events_are_not_published() {
    let today = day((2024, 1, 2));
    let (_conn, events, _clock, service) = setup(today);
    events
        .create_special_event(&special("Yesterday", "08:00", day(MONDAY), false))
        .unwrap();
    events
        .create_special_event(&special("Done", "08:00", today, true))
        .unwrap();

    assert_eq!(service.resync().unwrap(), 0);
    assert!(service.list_device_schedule().unwrap().is_empty());
}

#[test]
fn empty_and_inactive_events_never_ring() {
    let (_conn, events, _clock, service) = setup(day(MONDAY));
    events
        .create_normal_event(&normal("Never", "07:00", 0, &[]))
        .unwrap();
    let mut off = normal("Off", "07:00", 0, &Weekday::ALL);
    off.active = false;
    events.create_normal_event(&off).unwrap();

    assert_eq!(service.resync().unwrap(), 0);
}

#[test]
fn resync_is_idempotent() {
    let today = day(MONDAY);
    let (_conn, events, _clock, service) = setup(today);
    events
        .create_normal_event(&normal("Wake", "07:00", 300, &[Weekday::Monday]))
        .unwrap();
    events
        .create_special_event(&special("Dentist", "15:00", today, false))
        .unwrap();

    service.resync().unwrap();
    let first = service.list_device_schedule().unwrap();
    let first_run = service.schedule_status().unwrap().unwrap().run_id;
    service.resync().unwrap();
    let second = service.list_device_schedule().unwrap();
    let second_run = service.schedule_status().unwrap().unwrap().run_id;

    assert_eq!(first, second);
    assert_ne!(first_run, second_run);
}

#[test]
fn status_records_the_published_day() {
    let (_conn, events, clock, service) = setup(day(MONDAY));
    assert_eq!(service.schedule_status().unwrap(), None);

    events
        .create_normal_event(&normal("Wake", "07:00", 0, &[Weekday::Monday]))
        .unwrap();
    service.resync().unwrap();
    let status = service.schedule_status().unwrap().unwrap();
    assert_eq!(status.synced_for, day(MONDAY));
    assert_eq!(status.entry_count, 1);
    assert!(status.synced_at_ms > 0);

    clock.set(day((2024, 1, 2)));
    assert_eq!(service.resync().unwrap(), 0);
    let status = service.schedule_status().unwrap().unwrap();
    assert_eq!(status.synced_for, day((2024, 1, 2)));
    assert_eq!(status.entry_count, 0);
    assert!(service.list_device_schedule().unwrap().is_empty());
}

#[test]
fn completing_a_special_event_removes_it_on_next_resync() {
    let today = day(MONDAY);
    let (_conn, events, _clock, service) = setup(today);
    let mut event = events
        .create_special_event(&special("Call mum", "18:00", today, false))
        .unwrap();
    assert_eq!(service.resync().unwrap(), 1);

    event.completed = true;
    events.update_special_event(&event).unwrap();
    assert_eq!(service.resync().unwrap(), 0);
}

/// Event source that fails on demand, wrapping the real store.
struct FlakyEvents {
    inner: SqliteEventRepository,
    fail: AtomicBool,
}

impl EventSource for FlakyEvents {
    fn list_active_normal_events(&self) -> RepoResult<Vec<NormalEvent>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RepoError::InvalidData("store offline".to_string()));
        }
        self.inner.list_active_normal_events()
    }

    fn list_special_events(
        &self,
        date: NaiveDate,
        completed: bool,
    ) -> RepoResult<Vec<SpecialEvent>> {
        self.inner.list_special_events(date, completed)
    }
}

#[test]
fn failed_load_keeps_previous_schedule() {
    let conn = SharedConnection::open_in_memory().unwrap();
    let events = SqliteEventRepository::try_new(conn.clone()).unwrap();
    events
        .create_normal_event(&normal("Wake", "07:00", 300, &[Weekday::Monday]))
        .unwrap();
    let flaky = FlakyEvents {
        inner: events.clone(),
        fail: AtomicBool::new(false),
    };
    let service = ProjectionService::new(
        flaky,
        SqliteScheduleRepository::try_new(conn.clone()).unwrap(),
        FixedClock::new(day(MONDAY)),
    );
    service.resync().unwrap();
    let published = service.list_device_schedule().unwrap();

    events
        .create_normal_event(&normal("Extra", "08:00", 0, &[Weekday::Monday]))
        .unwrap();
    service.events().fail.store(true, Ordering::SeqCst);

    let err = service.resync().unwrap_err();
    assert!(matches!(
        err,
        SyncError::StoreUnavailable {
            stage: SyncStage::LoadNormalEvents,
            ..
        }
    ));
    assert_eq!(service.list_device_schedule().unwrap(), published);
}

#[test]
fn failed_publish_rolls_back_to_previous_schedule() {
    let (conn, events, _clock, service) = setup(day(MONDAY));
    events
        .create_normal_event(&normal("Alpha", "07:00", 0, &[Weekday::Monday]))
        .unwrap();
    service.resync().unwrap();
    let published = service.list_device_schedule().unwrap();
    let status = service.schedule_status().unwrap();

    conn.lock()
        .unwrap()
        .execute_batch(
            "CREATE TRIGGER reject_boom BEFORE INSERT ON device_schedule
             WHEN NEW.title = 'boom'
             BEGIN
                SELECT RAISE(ABORT, 'boom rejected');
             END;",
        )
        .unwrap();
    events
        .create_normal_event(&normal("Beta", "06:00", 0, &[Weekday::Monday]))
        .unwrap();
    events
        .create_normal_event(&normal("boom", "09:00", 0, &[Weekday::Monday]))
        .unwrap();

    let err = service.resync().unwrap_err();
    assert!(matches!(
        err,
        SyncError::StoreUnavailable {
            stage: SyncStage::PublishSchedule,
            ..
        }
    ));
    assert_eq!(service.list_device_schedule().unwrap(), published);
    assert_eq!(service.schedule_status().unwrap(), status);
}

#[test]
fn concurrent_resyncs_never_expose_mixed_or_duplicate_entries() {
    let today = day(MONDAY);
    let (_conn, events, _clock, service) = setup(today);
    for hour in 6..12 {
        events
            .create_normal_event(&normal(
                &format!("n{hour}"),
                &format!("{hour:02}:00"),
                0,
                &[Weekday::Monday],
            ))
            .unwrap();
    }
    events
        .create_special_event(&special("s", "13:00", today, false))
        .unwrap();
    let expected = 7;
    let service = Arc::new(service);

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                for _ in 0..10 {
                    assert_eq!(service.resync().unwrap(), expected);
                }
            })
        })
        .collect();

    let reader = {
        let service = Arc::clone(&service);
        thread::spawn(move || {
            for _ in 0..200 {
                let entries = service.list_device_schedule().unwrap();
                assert!(entries.is_empty() || entries.len() == expected);
                let unique: HashSet<_> = entries.iter().collect();
                assert_eq!(unique.len(), entries.len());
            }
        })
    };

    for writer in writers {
        writer.join().unwrap();
    }
    reader.join().unwrap();

    assert_eq!(service.list_device_schedule().unwrap().len(), expected);
}

#[test]
fn unreadable_rows_are_skipped_and_the_rest_is_published() {
    let today = day(MONDAY);
    let (conn, events, _clock, service) = setup(today);
    events
        .create_normal_event(&normal("Wake", "07:00", 300, &[Weekday::Monday]))
        .unwrap();
    conn.lock()
        .unwrap()
        .execute_batch(
            "INSERT INTO normal_events (title, time, delay, tone, active, frequency)
             VALUES ('Gym', '7am', 0, 'bell', 1, '[\"tuesday\"]');
             INSERT INTO normal_events (title, time, delay, tone, active, frequency)
             VALUES ('', '08:00', 0, 'bell', 1, '[\"monday\"]');
             INSERT INTO special_events (date, time, description, tone, completed)
             VALUES ('2024-01-01', 'noon', 'Lunch', 'chime', 0);",
        )
        .unwrap();
    events
        .create_special_event(&special("Dentist", "15:00", today, false))
        .unwrap();

    assert_eq!(service.resync().unwrap(), 2);
    assert_eq!(
        service.list_device_schedule().unwrap(),
        vec![
            entry("Wake", "07:00", 300, ScheduleSource::Normal),
            entry("Dentist", "15:00", 0, ScheduleSource::Special),
        ]
    );
}
