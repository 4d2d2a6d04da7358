//! Panic alert rows.
//!
//! Alerts accumulate until an administrator clears them; clearing is a
//! wholesale `DELETE` of the table, mirroring the reset-all semantics of
//! the alert channel.

use rusqlite::params;

use guardian_core::{AlertId, PanicAlert};

use crate::database::Database;
use crate::error::Result;
use crate::events::{parse_timestamp, parse_uuid};

impl Database {
    pub fn insert_alert(&self, alert: &PanicAlert) -> Result<()> {
        self.conn().execute(
            "INSERT INTO panic_alerts (id, guard_name, location, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                alert.id.to_string(),
                alert.guard_name,
                alert.location,
                alert.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// All outstanding alerts, newest first.
    pub fn outstanding_alerts(&self) -> Result<Vec<PanicAlert>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, guard_name, location, timestamp
             FROM panic_alerts
             ORDER BY timestamp DESC",
        )?;
        let rows = stmt.query_map([], row_to_alert)?;

        let mut alerts = Vec::new();
        for row in rows {
            alerts.push(row?);
        }
        Ok(alerts)
    }

    /// Clear every outstanding alert.  Returns how many were removed;
    /// calling this on an empty table is a harmless no-op.
    pub fn clear_alerts(&self) -> Result<usize> {
        let affected = self.conn().execute("DELETE FROM panic_alerts", [])?;
        Ok(affected)
    }
}

fn row_to_alert(row: &rusqlite::Row<'_>) -> rusqlite::Result<PanicAlert> {
    let id: String = row.get(0)?;
    Ok(PanicAlert {
        id: AlertId(parse_uuid(0, &id)?),
        guard_name: row.get(1)?,
        location: row.get(2)?,
        timestamp: parse_timestamp(3, &row.get::<_, String>(3)?)?,
    })
}
