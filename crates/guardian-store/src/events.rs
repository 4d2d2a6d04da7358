//! Append-only attendance event log.
//!
//! Events are only ever inserted; nothing in this crate (or any other)
//! updates or deletes a row once written.  A single `INSERT` either commits
//! or errors, so an append is atomic from the engine's perspective.

use chrono::{DateTime, Utc};
use rusqlite::params;

use guardian_core::{AttendanceEvent, EventId, EventKind, EventOutcome, GuardId};

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Append one attendance event.
    pub fn append_event(&self, event: &AttendanceEvent) -> Result<()> {
        self.conn().execute(
            "INSERT INTO attendance_events (id, guard_id, guard_name, kind, timestamp, outcome, location)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.id.to_string(),
                event.guard_id.to_string(),
                event.guard_name,
                event.kind.as_str(),
                event.timestamp.to_rfc3339(),
                event.outcome.as_str(),
                event.location,
            ],
        )?;
        Ok(())
    }

    /// Full event history for one guard, newest first.
    pub fn events_for_guard(&self, guard_id: GuardId) -> Result<Vec<AttendanceEvent>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, guard_id, guard_name, kind, timestamp, outcome, location
             FROM attendance_events
             WHERE guard_id = ?1
             ORDER BY timestamp DESC",
        )?;

        let rows = stmt.query_map(params![guard_id.to_string()], row_to_event)?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    /// Most recent events across all guards (the admin activity feed).
    pub fn recent_events(&self, limit: u32) -> Result<Vec<AttendanceEvent>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, guard_id, guard_name, kind, timestamp, outcome, location
             FROM attendance_events
             ORDER BY timestamp DESC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit], row_to_event)?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<AttendanceEvent> {
    let id: String = row.get(0)?;
    let guard_id: String = row.get(1)?;
    let guard_name: String = row.get(2)?;
    let kind: String = row.get(3)?;
    let timestamp: String = row.get(4)?;
    let outcome: String = row.get(5)?;
    let location: Option<String> = row.get(6)?;

    Ok(AttendanceEvent {
        id: EventId(parse_uuid(0, &id)?),
        guard_id: GuardId(parse_uuid(1, &guard_id)?),
        guard_name,
        kind: EventKind::from_str(&kind).ok_or_else(|| bad_column(3, &kind))?,
        timestamp: parse_timestamp(4, &timestamp)?,
        outcome: EventOutcome::from_str(&outcome).ok_or_else(|| bad_column(5, &outcome))?,
        location,
    })
}

pub(crate) fn parse_uuid(index: usize, value: &str) -> rusqlite::Result<uuid::Uuid> {
    uuid::Uuid::parse_str(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn parse_timestamp(index: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                index,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

pub(crate) fn bad_column(index: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        rusqlite::types::Type::Text,
        format!("unexpected value: {value}").into(),
    )
}
