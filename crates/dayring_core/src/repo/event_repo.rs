//! Event store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the filtered reads the projection engine runs on every resync.
//! - Provide plain CRUD over `normal_events` and `special_events`.
//!
//! # Invariants
//! - Frequency text is normalized to `Frequency` here, once; unknown tokens are
//!   logged and dropped.
//! - Times and dates are persisted in canonical `HH:MM` / `YYYY-MM-DD` form.
//! - `EventSource` reads skip rows that fail to parse or validate and log
//!   `event_row_skipped`; `EventRepository` reads fail with `InvalidData`.

use super::{bool_to_int, ensure_tables, int_to_bool, RepoError, RepoResult};
use crate::db::SharedConnection;
use crate::model::event::{
    EventId, EventKind, NewNormalEvent, NewSpecialEvent, NormalEvent, SpecialEvent,
};
use crate::model::time::{format_event_date, parse_event_date, TimeOfDay};
use crate::model::weekday::Frequency;
use chrono::NaiveDate;
use log::warn;
use rusqlite::{params, Connection, Row, Rows};

const NORMAL_SELECT_SQL: &str = "SELECT
    id,
    title,
    time,
    delay,
    tone,
    active,
    frequency
FROM normal_events";

const SPECIAL_SELECT_SQL: &str = "SELECT
    id,
    date,
    time,
    description,
    tone,
    completed
FROM special_events";

/// Read interface consumed by the projection engine.
pub trait EventSource: Send + Sync {
    /// All recurring events with `active = true`, in id order.
    fn list_active_normal_events(&self) -> RepoResult<Vec<NormalEvent>>;
    /// One-off events on `date` with the given completion flag, in id order.
    fn list_special_events(&self, date: NaiveDate, completed: bool)
        -> RepoResult<Vec<SpecialEvent>>;
}

/// CRUD interface used by operator tooling.
pub trait EventRepository: EventSource {
    fn create_normal_event(&self, event: &NewNormalEvent) -> RepoResult<NormalEvent>;
    fn update_normal_event(&self, event: &NormalEvent) -> RepoResult<()>;
    fn get_normal_event(&self, id: EventId) -> RepoResult<Option<NormalEvent>>;
    fn list_normal_events(&self) -> RepoResult<Vec<NormalEvent>>;
    fn delete_normal_event(&self, id: EventId) -> RepoResult<()>;

    fn create_special_event(&self, event: &NewSpecialEvent) -> RepoResult<SpecialEvent>;
    fn update_special_event(&self, event: &SpecialEvent) -> RepoResult<()>;
    fn get_special_event(&self, id: EventId) -> RepoResult<Option<SpecialEvent>>;
    fn list_special_events_all(&self) -> RepoResult<Vec<SpecialEvent>>;
    fn delete_special_event(&self, id: EventId) -> RepoResult<()>;
}

/// SQLite-backed event store.
#[derive(Debug, Clone)]
pub struct SqliteEventRepository {
    conn: SharedConnection,
}

impl SqliteEventRepository {
    /// Constructs a repository over a migrated connection.
    pub fn try_new(conn: SharedConnection) -> RepoResult<Self> {
        ensure_tables(&*conn.lock()?, &["normal_events", "special_events"])?;
        Ok(Self { conn })
    }
}

impl EventSource for SqliteEventRepository {
    fn list_active_normal_events(&self) -> RepoResult<Vec<NormalEvent>> {
        let conn = self.conn.lock()?;
        query_normal_events(
            &conn,
            &format!("{NORMAL_SELECT_SQL} WHERE active = 1 ORDER BY id ASC;"),
            RowPolicy::SkipInvalid,
        )
    }

    fn list_special_events(
        &self,
        date: NaiveDate,
        completed: bool,
    ) -> RepoResult<Vec<SpecialEvent>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{SPECIAL_SELECT_SQL}
             WHERE date = ?1
               AND completed = ?2
             ORDER BY id ASC;"
        ))?;
        let mut rows = stmt.query(params![format_event_date(date), bool_to_int(completed)])?;
        collect_rows(
            &mut rows,
            "special_events",
            RowPolicy::SkipInvalid,
            parse_special_row,
        )
    }
}

impl EventRepository for SqliteEventRepository {
    fn create_normal_event(&self, event: &NewNormalEvent) -> RepoResult<NormalEvent> {
        event.validate()?;

        let conn = self.conn.lock()?;
        conn.execute(
            "INSERT INTO normal_events (title, time, delay, tone, active, frequency)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                event.title.as_str(),
                event.time.to_string(),
                event.delay,
                event.tone.as_str(),
                bool_to_int(event.active),
                stored_frequency(&event.frequency)?,
            ],
        )?;

        Ok(event.clone().with_id(conn.last_insert_rowid()))
    }

    fn update_normal_event(&self, event: &NormalEvent) -> RepoResult<()> {
        event.validate()?;

        let changed = self.conn.lock()?.execute(
            "UPDATE normal_events
             SET
                title = ?1,
                time = ?2,
                delay = ?3,
                tone = ?4,
                active = ?5,
                frequency = ?6
             WHERE id = ?7;",
            params![
                event.title.as_str(),
                event.time.to_string(),
                event.delay,
                event.tone.as_str(),
                bool_to_int(event.active),
                stored_frequency(&event.frequency)?,
                event.id,
            ],
        )?;

        if changed == 0 {
            return Err(not_found(EventKind::Normal, event.id));
        }
        Ok(())
    }

    fn get_normal_event(&self, id: EventId) -> RepoResult<Option<NormalEvent>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(&format!("{NORMAL_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_normal_row(row)?));
        }
        Ok(None)
    }

    fn list_normal_events(&self) -> RepoResult<Vec<NormalEvent>> {
        let conn = self.conn.lock()?;
        query_normal_events(
            &conn,
            &format!("{NORMAL_SELECT_SQL} ORDER BY id ASC;"),
            RowPolicy::Strict,
        )
    }

    fn delete_normal_event(&self, id: EventId) -> RepoResult<()> {
        let changed = self
            .conn
            .lock()?
            .execute("DELETE FROM normal_events WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(not_found(EventKind::Normal, id));
        }
        Ok(())
    }

    fn create_special_event(&self, event: &NewSpecialEvent) -> RepoResult<SpecialEvent> {
        event.validate()?;

        let conn = self.conn.lock()?;
        conn.execute(
            "INSERT INTO special_events (date, time, description, tone, completed)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                format_event_date(event.date),
                event.time.to_string(),
                event.description.as_str(),
                event.tone.as_str(),
                bool_to_int(event.completed),
            ],
        )?;

        Ok(event.clone().with_id(conn.last_insert_rowid()))
    }

    fn update_special_event(&self, event: &SpecialEvent) -> RepoResult<()> {
        event.validate()?;

        let changed = self.conn.lock()?.execute(
            "UPDATE special_events
             SET
                date = ?1,
                time = ?2,
                description = ?3,
                tone = ?4,
                completed = ?5
             WHERE id = ?6;",
            params![
                format_event_date(event.date),
                event.time.to_string(),
                event.description.as_str(),
                event.tone.as_str(),
                bool_to_int(event.completed),
                event.id,
            ],
        )?;

        if changed == 0 {
            return Err(not_found(EventKind::Special, event.id));
        }
        Ok(())
    }

    fn get_special_event(&self, id: EventId) -> RepoResult<Option<SpecialEvent>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(&format!("{SPECIAL_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_special_row(row)?));
        }
        Ok(None)
    }

    fn list_special_events_all(&self) -> RepoResult<Vec<SpecialEvent>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(&format!("{SPECIAL_SELECT_SQL} ORDER BY date ASC, id ASC;"))?;
        let mut rows = stmt.query([])?;
        collect_rows(&mut rows, "special_events", RowPolicy::Strict, parse_special_row)
    }

    fn delete_special_event(&self, id: EventId) -> RepoResult<()> {
        let changed = self
            .conn
            .lock()?
            .execute("DELETE FROM special_events WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(not_found(EventKind::Special, id));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowPolicy {
    /// Any unparsable row fails the whole read.
    Strict,
    /// Unparsable or invalid rows are logged and left out.
    SkipInvalid,
}

fn query_normal_events(
    conn: &Connection,
    sql: &str,
    policy: RowPolicy,
) -> RepoResult<Vec<NormalEvent>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    collect_rows(&mut rows, "normal_events", policy, parse_normal_row)
}

fn collect_rows<T>(
    rows: &mut Rows<'_>,
    table: &str,
    policy: RowPolicy,
    parse: fn(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Vec<T>> {
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        match parse(row) {
            Ok(item) => items.push(item),
            Err(err @ (RepoError::InvalidData(_) | RepoError::Validation(_)))
                if policy == RowPolicy::SkipInvalid =>
            {
                let id: EventId = row.get("id")?;
                warn!(
                    "event=event_row_skipped module=repo status=degraded table={} event_id={} error={}",
                    table, id, err
                );
            }
            Err(err) => return Err(err),
        }
    }
    Ok(items)
}

fn parse_normal_row(row: &Row<'_>) -> RepoResult<NormalEvent> {
    let id: EventId = row.get("id")?;
    let time_text: String = row.get("time")?;
    let time = parse_time_column(&time_text, "normal_events.time")?;

    // Frequency anomalies never fail the read: the bad tokens just never match.
    let frequency_text: String = row.get("frequency")?;
    let parsed = Frequency::parse(&frequency_text);
    for issue in &parsed.malformed {
        warn!(
            "event=frequency_token_ignored module=repo status=degraded event_id={} detail={}",
            id, issue
        );
    }

    let event = NormalEvent {
        id,
        title: row.get("title")?,
        time,
        delay: row.get("delay")?,
        tone: row.get("tone")?,
        active: int_to_bool(row.get("active")?, "normal_events.active")?,
        frequency: parsed.frequency,
    };
    event.validate()?;
    Ok(event)
}

fn parse_special_row(row: &Row<'_>) -> RepoResult<SpecialEvent> {
    let date_text: String = row.get("date")?;
    let date = parse_event_date(&date_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid date `{date_text}` in special_events.date"
        ))
    })?;
    let time_text: String = row.get("time")?;

    let event = SpecialEvent {
        id: row.get("id")?,
        date,
        time: parse_time_column(&time_text, "special_events.time")?,
        description: row.get("description")?,
        tone: row.get("tone")?,
        completed: int_to_bool(row.get("completed")?, "special_events.completed")?,
    };
    event.validate()?;
    Ok(event)
}

fn parse_time_column(value: &str, column: &str) -> RepoResult<TimeOfDay> {
    value
        .parse()
        .map_err(|_| RepoError::InvalidData(format!("invalid time `{value}` in {column}")))
}

fn stored_frequency(frequency: &Frequency) -> RepoResult<String> {
    frequency
        .to_stored()
        .map_err(|err| RepoError::InvalidData(format!("unserializable frequency: {err}")))
}

fn not_found(kind: EventKind, id: EventId) -> RepoError {
    RepoError::NotFound { kind, id }
}
