//! Published device schedule store.
//!
//! # Responsibility
//! - Hold the schedule the remote device polls.
//! - Replace it as a whole, never row by row.
//!
//! # Invariants
//! - `replace_schedule` deletes, inserts and records status inside one
//!   `IMMEDIATE` transaction under one connection lock; a failure anywhere
//!   rolls back and the previous schedule stays published.
//! - Reads order by time of day, then insertion order, then title.
//! - Only the projection engine calls `replace_schedule`.

use super::{ensure_tables, RepoError, RepoResult};
use crate::db::SharedConnection;
use crate::model::schedule::{
    DeviceScheduleEntry, ScheduleSnapshot, ScheduleSource, ScheduleStatus,
};
use crate::model::time::{format_event_date, parse_event_date};
use rusqlite::{params, Row, TransactionBehavior};
use uuid::Uuid;

/// Storage contract for the published schedule.
pub trait DeviceScheduleStore: Send + Sync {
    /// Atomically swaps in `snapshot` and returns the published entry count.
    fn replace_schedule(&self, snapshot: &ScheduleSnapshot) -> RepoResult<usize>;
    /// Published entries in device order.
    fn list_device_schedule(&self) -> RepoResult<Vec<DeviceScheduleEntry>>;
    /// Status of the last successful publication, if any.
    fn schedule_status(&self) -> RepoResult<Option<ScheduleStatus>>;
}

/// SQLite-backed device schedule store.
#[derive(Debug, Clone)]
pub struct SqliteScheduleRepository {
    conn: SharedConnection,
}

impl SqliteScheduleRepository {
    pub fn try_new(conn: SharedConnection) -> RepoResult<Self> {
        ensure_tables(
            &*conn.lock()?,
            &["device_schedule", "device_schedule_status"],
        )?;
        Ok(Self { conn })
    }
}

impl DeviceScheduleStore for SqliteScheduleRepository {
    fn replace_schedule(&self, snapshot: &ScheduleSnapshot) -> RepoResult<usize> {
        let entry_count = i64::try_from(snapshot.entries.len()).map_err(|_| {
            RepoError::InvalidData(format!(
                "schedule size {} exceeds storage range",
                snapshot.entries.len()
            ))
        })?;

        let mut conn = self.conn.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM device_schedule;", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO device_schedule (title, time, delay, source)
                 VALUES (?1, ?2, ?3, ?4);",
            )?;
            for entry in &snapshot.entries {
                insert.execute(params![
                    entry.title.as_str(),
                    entry.time.to_string(),
                    entry.delay,
                    entry.source.as_str(),
                ])?;
            }
        }
        tx.execute(
            "INSERT INTO device_schedule_status (id, run_id, synced_for, entry_count, synced_at_ms)
             VALUES (1, ?1, ?2, ?3, (strftime('%s', 'now') * 1000))
             ON CONFLICT(id) DO UPDATE SET
                run_id = excluded.run_id,
                synced_for = excluded.synced_for,
                entry_count = excluded.entry_count,
                synced_at_ms = excluded.synced_at_ms;",
            params![
                snapshot.run_id.to_string(),
                format_event_date(snapshot.synced_for),
                entry_count,
            ],
        )?;
        tx.commit()?;

        Ok(snapshot.entries.len())
    }

    fn list_device_schedule(&self) -> RepoResult<Vec<DeviceScheduleEntry>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(
            "SELECT title, time, delay, source
             FROM device_schedule
             ORDER BY time ASC, id ASC, title ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_entry_row(row)?);
        }
        Ok(entries)
    }

    fn schedule_status(&self) -> RepoResult<Option<ScheduleStatus>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(
            "SELECT run_id, synced_for, entry_count, synced_at_ms
             FROM device_schedule_status
             WHERE id = 1;",
        )?;
        let mut rows = stmt.query([])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_status_row(row)?));
        }
        Ok(None)
    }
}

fn parse_entry_row(row: &Row<'_>) -> RepoResult<DeviceScheduleEntry> {
    let time_text: String = row.get("time")?;
    let time = time_text.parse().map_err(|_| {
        RepoError::InvalidData(format!("invalid time `{time_text}` in device_schedule.time"))
    })?;

    let source_text: String = row.get("source")?;
    let source = ScheduleSource::parse(&source_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid source `{source_text}` in device_schedule.source"
        ))
    })?;

    Ok(DeviceScheduleEntry {
        title: row.get("title")?,
        time,
        delay: row.get("delay")?,
        source,
    })
}

fn parse_status_row(row: &Row<'_>) -> RepoResult<ScheduleStatus> {
    let run_text: String = row.get("run_id")?;
    let run_id = Uuid::parse_str(&run_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid uuid `{run_text}` in device_schedule_status.run_id"
        ))
    })?;

    let date_text: String = row.get("synced_for")?;
    let synced_for = parse_event_date(&date_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid date `{date_text}` in device_schedule_status.synced_for"
        ))
    })?;

    let count: i64 = row.get("entry_count")?;
    let entry_count = usize::try_from(count).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid entry_count `{count}` in device_schedule_status"
        ))
    })?;

    Ok(ScheduleStatus {
        run_id,
        synced_for,
        entry_count,
        synced_at_ms: row.get("synced_at_ms")?,
    })
}
