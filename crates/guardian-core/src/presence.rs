//! Presence derivation.
//!
//! Duty state is a pure projection of a guard's attendance event history,
//! the shift schedule and an injected wall-clock instant.  Nothing here is
//! cached or stored; the engine recomputes on a polling cadence.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AttendanceEvent, EventKind, EventOutcome, Guard};
use crate::shift::Shift;
use crate::types::GuardId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DutyState {
    OffDuty,
    OnTime,
    Late,
    MissedCheckIn,
}

impl std::fmt::Display for DutyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DutyState::OffDuty => "off duty",
            DutyState::OnTime => "on time",
            DutyState::Late => "late",
            DutyState::MissedCheckIn => "missed check-in",
        };
        write!(f, "{s}")
    }
}

/// Derived duty status for one on-duty guard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresenceStatus {
    pub guard_id: GuardId,
    pub guard_name: String,
    pub state: DutyState,
    /// Timestamp of the clock-in that opened the current duty session.
    pub login_time: DateTime<Utc>,
    /// When the next periodic check-in is due.
    pub next_check_in_due: DateTime<Utc>,
}

/// Fold a guard's event history into a duty status.
///
/// Returns `None` for an off-duty guard (omitted from the active roster).
///
/// Only `Success` events participate: a failed clock-in never puts a guard
/// on duty, and a failed check-in never confirms a deadline.  When a
/// clock-in and a clock-out share a timestamp the clock-out wins, failing
/// safe toward not showing the guard as active.
///
/// `shift` is the guard's schedule for the day under evaluation (resolved by
/// the caller); `shift_offset` maps UTC instants onto the local clock the
/// schedule is written in.
pub fn derive_presence(
    guard: &Guard,
    events: &[AttendanceEvent],
    shift: Option<&Shift>,
    checkin_interval: Duration,
    shift_offset: FixedOffset,
    now: DateTime<Utc>,
) -> Option<PresenceStatus> {
    let successes = |kind: EventKind| {
        events
            .iter()
            .filter(move |e| e.kind == kind && e.outcome == EventOutcome::Success)
            .max_by_key(|e| e.timestamp)
    };

    let clock_in = successes(EventKind::ClockIn)?;
    if let Some(clock_out) = successes(EventKind::ClockOut) {
        if clock_in.timestamp <= clock_out.timestamp {
            return None;
        }
    }

    let late = shift
        .and_then(|s| scheduled_start_utc(s, shift_offset))
        .map(|start| clock_in.timestamp > start)
        .unwrap_or(false);

    // Deadline base: the last successful check-in of this duty session,
    // else the clock-in itself.
    let base = events
        .iter()
        .filter(|e| {
            e.kind == EventKind::CheckIn
                && e.outcome == EventOutcome::Success
                && e.timestamp >= clock_in.timestamp
        })
        .map(|e| e.timestamp)
        .max()
        .unwrap_or(clock_in.timestamp);
    let next_check_in_due = base + checkin_interval;

    let state = if now >= next_check_in_due {
        DutyState::MissedCheckIn
    } else if late {
        DutyState::Late
    } else {
        DutyState::OnTime
    };

    Some(PresenceStatus {
        guard_id: guard.id,
        guard_name: guard.name.clone(),
        state,
        login_time: clock_in.timestamp,
        next_check_in_due,
    })
}

/// The shift's scheduled start as a UTC instant.
fn scheduled_start_utc(shift: &Shift, offset: FixedOffset) -> Option<DateTime<Utc>> {
    use chrono::TimeZone;
    offset
        .from_local_datetime(&shift.day.and_time(shift.start))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}
