//! # guardian-core
//!
//! Pure domain layer for the Guardian attendance engine.
//!
//! This crate holds everything that can be computed without I/O:
//! - typed identifiers and domain models
//! - the geofence validator (haversine acceptance check)
//! - the shift window policy, including overnight wraparound
//! - the presence derivation fold over a guard's event history
//! - the engine-facing error taxonomy
//!
//! All functions here are deterministic and take an injected "now", so the
//! timing logic is unit-testable without a running clock.

pub mod error;
pub mod geofence;
pub mod models;
pub mod presence;
pub mod shift;
pub mod types;

pub use error::ConfigIssue;
pub use models::*;
pub use presence::{derive_presence, DutyState, PresenceStatus};
pub use shift::Shift;
pub use types::*;
