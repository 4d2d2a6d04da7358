//! # guardian-engine
//!
//! The live subsystems of the Guardian attendance engine:
//!
//! - [`attendance::AttendanceService`] -- the gated write path that turns
//!   clock/check attempts into appended events
//! - [`monitor::PresenceMonitor`] -- the polling sweep that projects event
//!   history into the active-guard roster
//! - [`scheduler::CheckInScheduler`] -- per-guard cancelable check-in
//!   deadline timers
//! - [`alerts::PanicChannel`] -- at-least-once panic alert fan-out
//!
//! Per-guard work is independent; the only shared state is the store handle
//! (a [`Database`] behind a tokio mutex) and the read-only roster.

pub mod alerts;
pub mod attendance;
pub mod monitor;
pub mod scheduler;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use guardian_core::ConfigIssue;
use guardian_store::{Database, StoreError};

/// The store handle shared by all subsystems.
///
/// `rusqlite::Connection` is not `Sync`, so access is serialized through an
/// async mutex; subsystems hold the lock only for short, bounded sections.
pub type SharedDb = Arc<Mutex<Database>>;

/// Errors surfaced by the engine's operations.
///
/// Policy rejections are deliberately absent: a rejected attempt is a
/// recorded `Failed` event on the receipt, not an error (see
/// [`attendance::RejectReason`]).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The guard's directory entry cannot support the attempt; the guard
    /// should contact an administrator rather than retry.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigIssue),

    /// The durable store could not be reached.  Transient; the caller
    /// should retry the whole operation.
    #[error("store unavailable: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
