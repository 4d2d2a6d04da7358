//! v001 -- Initial schema creation.
//!
//! Creates the five core tables: `guards`, `locations`, `shifts`,
//! `attendance_events`, and `panic_alerts`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Locations (geofence centers)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS locations (
    id        TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    name      TEXT NOT NULL,
    latitude  REAL NOT NULL,
    longitude REAL NOT NULL,
    radius_m  REAL                          -- NULL -> engine default (30 m)
);

-- ----------------------------------------------------------------
-- Guards (engine-facing slice of the external user directory)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS guards (
    id          TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    name        TEXT NOT NULL,
    location_id TEXT,                       -- nullable FK -> locations(id)
    rank        TEXT,                       -- rookie | veteran | elite
    created_at  TEXT NOT NULL,              -- ISO-8601 / RFC-3339

    FOREIGN KEY (location_id) REFERENCES locations(id) ON DELETE SET NULL
);

-- ----------------------------------------------------------------
-- Shifts: at most one per (guard, day)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS shifts (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    guard_id   TEXT NOT NULL,               -- FK -> guards(id)
    day        TEXT NOT NULL,               -- YYYY-MM-DD
    start_time TEXT NOT NULL,               -- HH:MM
    end_time   TEXT NOT NULL,               -- HH:MM (<= start wraps midnight)

    FOREIGN KEY (guard_id) REFERENCES guards(id) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_shifts_guard_day
    ON shifts(guard_id, day);

-- ----------------------------------------------------------------
-- Attendance events: append-only, per-guard timestamp-ordered
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS attendance_events (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    guard_id   TEXT NOT NULL,
    guard_name TEXT NOT NULL,
    kind       TEXT NOT NULL,               -- clock_in | clock_out | check_in
    timestamp  TEXT NOT NULL,               -- ISO-8601
    outcome    TEXT NOT NULL,               -- success | failed
    location   TEXT                         -- free-text label at event time
);

CREATE INDEX IF NOT EXISTS idx_events_guard_ts
    ON attendance_events(guard_id, timestamp DESC);

-- ----------------------------------------------------------------
-- Panic alerts: cleared wholesale by an administrator reset
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS panic_alerts (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    guard_name TEXT NOT NULL,
    location   TEXT NOT NULL,
    timestamp  TEXT NOT NULL
);
"#;

pub fn up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(UP_SQL)
}
