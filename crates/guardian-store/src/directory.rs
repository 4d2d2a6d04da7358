//! Directory tables: guards, locations and shifts.
//!
//! These are owned by the surrounding application; the engine only reads
//! them.  The insert/upsert helpers exist so a deployment (and the tests)
//! can be populated through the same narrow surface.

use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, OptionalExtension};

use guardian_core::{Guard, GuardId, GuardRank, Location, LocationId, Shift, ShiftId};

use crate::database::Database;
use crate::error::Result;
use crate::events::{bad_column, parse_timestamp, parse_uuid};

impl Database {
    // -- guards ---------------------------------------------------------

    pub fn insert_guard(&self, guard: &Guard) -> Result<()> {
        self.conn().execute(
            "INSERT INTO guards (id, name, location_id, rank, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                guard.id.to_string(),
                guard.name,
                guard.location_id.map(|l| l.to_string()),
                guard.rank.map(|r| r.as_str()),
                guard.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn guard(&self, id: GuardId) -> Result<Option<Guard>> {
        let guard = self
            .conn()
            .query_row(
                "SELECT id, name, location_id, rank, created_at
                 FROM guards WHERE id = ?1",
                params![id.to_string()],
                row_to_guard,
            )
            .optional()?;
        Ok(guard)
    }

    pub fn list_guards(&self) -> Result<Vec<Guard>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, name, location_id, rank, created_at
             FROM guards ORDER BY name",
        )?;
        let rows = stmt.query_map([], row_to_guard)?;

        let mut guards = Vec::new();
        for row in rows {
            guards.push(row?);
        }
        Ok(guards)
    }

    // -- locations ------------------------------------------------------

    pub fn insert_location(&self, location: &Location) -> Result<()> {
        self.conn().execute(
            "INSERT INTO locations (id, name, latitude, longitude, radius_m)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                location.id.to_string(),
                location.name,
                location.latitude,
                location.longitude,
                location.radius_m,
            ],
        )?;
        Ok(())
    }

    pub fn location(&self, id: LocationId) -> Result<Option<Location>> {
        let location = self
            .conn()
            .query_row(
                "SELECT id, name, latitude, longitude, radius_m
                 FROM locations WHERE id = ?1",
                params![id.to_string()],
                row_to_location,
            )
            .optional()?;
        Ok(location)
    }

    pub fn list_locations(&self) -> Result<Vec<Location>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, name, latitude, longitude, radius_m
             FROM locations ORDER BY name",
        )?;
        let rows = stmt.query_map([], row_to_location)?;

        let mut locations = Vec::new();
        for row in rows {
            locations.push(row?);
        }
        Ok(locations)
    }

    // -- shifts ---------------------------------------------------------

    /// Insert or replace the shift for `(guard, day)`.  The unique index on
    /// the pair keeps the zero-or-one-per-day invariant.
    pub fn upsert_shift(&self, shift: &Shift) -> Result<()> {
        self.conn().execute(
            "INSERT INTO shifts (id, guard_id, day, start_time, end_time)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (guard_id, day) DO UPDATE SET
               start_time = excluded.start_time,
               end_time = excluded.end_time",
            params![
                shift.id.to_string(),
                shift.guard_id.to_string(),
                shift.day.format("%Y-%m-%d").to_string(),
                shift.start.format("%H:%M").to_string(),
                shift.end.format("%H:%M").to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn shift_for(&self, guard_id: GuardId, day: NaiveDate) -> Result<Option<Shift>> {
        let shift = self
            .conn()
            .query_row(
                "SELECT id, guard_id, day, start_time, end_time
                 FROM shifts WHERE guard_id = ?1 AND day = ?2",
                params![guard_id.to_string(), day.format("%Y-%m-%d").to_string()],
                row_to_shift,
            )
            .optional()?;
        Ok(shift)
    }
}

fn row_to_guard(row: &rusqlite::Row<'_>) -> rusqlite::Result<Guard> {
    let id: String = row.get(0)?;
    let name: String = row.get(1)?;
    let location_id: Option<String> = row.get(2)?;
    let rank: Option<String> = row.get(3)?;
    let created_at: String = row.get(4)?;

    let location_id = match location_id {
        Some(l) => Some(LocationId(parse_uuid(2, &l)?)),
        None => None,
    };
    let rank = match rank {
        Some(r) => Some(GuardRank::from_str(&r).ok_or_else(|| bad_column(3, &r))?),
        None => None,
    };

    Ok(Guard {
        id: GuardId(parse_uuid(0, &id)?),
        name,
        location_id,
        rank,
        created_at: parse_timestamp(4, &created_at)?,
    })
}

fn row_to_location(row: &rusqlite::Row<'_>) -> rusqlite::Result<Location> {
    let id: String = row.get(0)?;
    Ok(Location {
        id: LocationId(parse_uuid(0, &id)?),
        name: row.get(1)?,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        radius_m: row.get(4)?,
    })
}

fn row_to_shift(row: &rusqlite::Row<'_>) -> rusqlite::Result<Shift> {
    let id: String = row.get(0)?;
    let guard_id: String = row.get(1)?;
    let day: String = row.get(2)?;
    let start: String = row.get(3)?;
    let end: String = row.get(4)?;

    Ok(Shift {
        id: ShiftId(parse_uuid(0, &id)?),
        guard_id: GuardId(parse_uuid(1, &guard_id)?),
        day: parse_day(2, &day)?,
        start: parse_hhmm(3, &start)?,
        end: parse_hhmm(4, &end)?,
    })
}

fn parse_day(index: usize, value: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_hhmm(index: usize, value: &str) -> rusqlite::Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn open_test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn location() -> Location {
        Location {
            id: LocationId::new(),
            name: "Gate A".to_string(),
            latitude: 37.7749,
            longitude: -122.4194,
            radius_m: Some(30.0),
        }
    }

    fn guard(location_id: Option<LocationId>) -> Guard {
        Guard {
            id: GuardId::new(),
            name: "Dana Reyes".to_string(),
            location_id,
            rank: Some(GuardRank::Veteran),
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    fn shift(guard_id: GuardId, start: (u32, u32), end: (u32, u32)) -> Shift {
        Shift {
            id: ShiftId::new(),
            guard_id,
            day: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            start: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
        }
    }

    #[test]
    fn guard_round_trip() {
        let (_dir, db) = open_test_db();
        let loc = location();
        db.insert_location(&loc).unwrap();
        let g = guard(Some(loc.id));
        db.insert_guard(&g).unwrap();

        assert_eq!(db.guard(g.id).unwrap(), Some(g));
        assert!(db.guard(GuardId::new()).unwrap().is_none());
    }

    #[test]
    fn location_round_trip() {
        let (_dir, db) = open_test_db();
        let loc = location();
        db.insert_location(&loc).unwrap();
        assert_eq!(db.location(loc.id).unwrap(), Some(loc.clone()));
        assert_eq!(db.list_locations().unwrap(), vec![loc]);
    }

    #[test]
    fn one_shift_per_guard_and_day() {
        let (_dir, db) = open_test_db();
        let loc = location();
        db.insert_location(&loc).unwrap();
        let g = guard(Some(loc.id));
        db.insert_guard(&g).unwrap();

        db.upsert_shift(&shift(g.id, (8, 0), (16, 0))).unwrap();
        db.upsert_shift(&shift(g.id, (9, 0), (17, 0))).unwrap();

        let day = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let stored = db.shift_for(g.id, day).unwrap().unwrap();
        assert_eq!(stored.start, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(stored.end, NaiveTime::from_hms_opt(17, 0, 0).unwrap());

        let other_day = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        assert!(db.shift_for(g.id, other_day).unwrap().is_none());
    }
}
