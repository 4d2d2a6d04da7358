//! Domain model structs shared by the store, engine and server.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to API clients as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AlertId, EventId, GuardId, LocationId};

// ---------------------------------------------------------------------------
// Guard
// ---------------------------------------------------------------------------

/// A guard as seen by the engine.  The full identity (credentials, contact
/// details) lives in the external user directory; only the fields the engine
/// reads are carried here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Guard {
    pub id: GuardId,
    pub name: String,
    /// Assigned patrol location.  A guard without one cannot pass any
    /// geofence check.
    pub location_id: Option<LocationId>,
    pub rank: Option<GuardRank>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GuardRank {
    Rookie,
    Veteran,
    Elite,
}

impl GuardRank {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardRank::Rookie => "rookie",
            GuardRank::Veteran => "veteran",
            GuardRank::Elite => "elite",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "rookie" => Some(GuardRank::Rookie),
            "veteran" => Some(GuardRank::Veteran),
            "elite" => Some(GuardRank::Elite),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// A patrol location with its geofence acceptance radius.
///
/// Edits only affect future checks; historical events keep the free-text
/// location label they were recorded with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Acceptance radius in meters.  `None` or a non-positive value falls
    /// back to [`crate::geofence::DEFAULT_RADIUS_M`].
    pub radius_m: Option<f64>,
}

// ---------------------------------------------------------------------------
// Attendance events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ClockIn,
    ClockOut,
    CheckIn,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ClockIn => "clock_in",
            EventKind::ClockOut => "clock_out",
            EventKind::CheckIn => "check_in",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "clock_in" => Some(EventKind::ClockIn),
            "clock_out" => Some(EventKind::ClockOut),
            "check_in" => Some(EventKind::CheckIn),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    Success,
    Failed,
}

impl EventOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventOutcome::Success => "success",
            EventOutcome::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "success" => Some(EventOutcome::Success),
            "failed" => Some(EventOutcome::Failed),
            _ => None,
        }
    }
}

/// One appended attendance event.  The per-guard sequence, ordered by
/// timestamp, is the sole source of truth for derived duty state.  Events
/// are never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttendanceEvent {
    pub id: EventId,
    pub guard_id: GuardId,
    /// Display name at the time of the event.
    pub guard_name: String,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub outcome: EventOutcome,
    /// Free-text location label (the assigned location's name at event time).
    pub location: Option<String>,
}

// ---------------------------------------------------------------------------
// Panic alert
// ---------------------------------------------------------------------------

/// A panic alert raised by a guard.  Exists until an administrator clears
/// all outstanding alerts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PanicAlert {
    pub id: AlertId,
    pub guard_name: String,
    pub location: String,
    pub timestamp: DateTime<Utc>,
}
