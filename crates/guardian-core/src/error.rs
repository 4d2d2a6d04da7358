//! Engine-facing error taxonomy.
//!
//! Policy rejections (outside the geofence, outside the shift window) are
//! *not* errors: they are recorded as `Failed` events and surfaced on the
//! attendance receipt.  Only conditions requiring administrator action or a
//! retry are modeled as errors.

use thiserror::Error;

/// A configuration problem that prevents an attendance attempt from being
/// evaluated at all.  Distinct from a policy rejection so the caller can
/// direct the guard to an administrator instead of retrying.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ConfigIssue {
    #[error("guard is not registered")]
    UnknownGuard,

    #[error("guard has no assigned location")]
    NoAssignedLocation,

    #[error("assigned location does not exist")]
    UnknownLocation,

    #[error("no shift is scheduled for today")]
    NoShiftToday,
}
