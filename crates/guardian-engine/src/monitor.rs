//! The presence sweep.
//!
//! The event log has no push notification, so duty state is recomputed on a
//! polling cadence: a full sweep over every registered guard, folding each
//! history through [`derive_presence`].  Recomputation is idempotent and
//! side-effect-free; the sweep task uses `MissedTickBehavior::Skip` so a
//! slow sweep drops backlogged ticks instead of queueing them.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error};

use guardian_core::{derive_presence, PresenceStatus};

use crate::{Result, SharedDb};

/// One projection of the active-guard roster.
#[derive(Debug, Clone, Serialize)]
pub struct Roster {
    /// The injected "now" the projection was computed against.
    pub computed_at: DateTime<Utc>,
    /// Every on-duty guard.  Off-duty guards and guards absent from the
    /// event log are omitted.
    pub on_duty: Vec<PresenceStatus>,
}

impl Roster {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            computed_at: now,
            on_duty: Vec::new(),
        }
    }

    /// A roster older than two sweep cadences is stale.  Staleness is a
    /// display hint, not an error.
    pub fn is_stale(&self, now: DateTime<Utc>, cadence: Duration) -> bool {
        now - self.computed_at > cadence * 2
    }
}

/// Periodically recomputes the roster from the event log.
#[derive(Clone)]
pub struct PresenceMonitor {
    db: SharedDb,
    roster: Arc<RwLock<Roster>>,
    cadence: StdDuration,
    checkin_interval: Duration,
    shift_offset: FixedOffset,
}

impl PresenceMonitor {
    pub fn new(
        db: SharedDb,
        checkin_interval: Duration,
        shift_offset: FixedOffset,
        cadence: StdDuration,
    ) -> Self {
        Self {
            db,
            roster: Arc::new(RwLock::new(Roster::empty(Utc::now()))),
            cadence,
            checkin_interval,
            shift_offset,
        }
    }

    /// Shared handle to the latest projection.
    pub fn roster(&self) -> Arc<RwLock<Roster>> {
        Arc::clone(&self.roster)
    }

    /// Recompute the roster once against the given instant and publish it.
    ///
    /// Read-only over the store; guards whose derivation says off-duty are
    /// dropped from the projection.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<Roster> {
        let mut on_duty = Vec::new();
        {
            let db = self.db.lock().await;
            let local_day = now.with_timezone(&self.shift_offset).date_naive();

            for guard in db.list_guards()? {
                let events = db.events_for_guard(guard.id)?;
                if events.is_empty() {
                    continue;
                }
                let shift = db.shift_for(guard.id, local_day)?;
                if let Some(status) = derive_presence(
                    &guard,
                    &events,
                    shift.as_ref(),
                    self.checkin_interval,
                    self.shift_offset,
                    now,
                ) {
                    on_duty.push(status);
                }
            }
        }

        let roster = Roster {
            computed_at: now,
            on_duty,
        };
        *self.roster.write().await = roster.clone();
        debug!(on_duty = roster.on_duty.len(), "presence sweep complete");
        Ok(roster)
    }

    /// Spawn the sweep loop.  Abort the handle to stop it.
    pub fn spawn(&self) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(e) = monitor.sweep(Utc::now()).await {
                    // Transient store trouble: keep the previous roster and
                    // try again next tick.
                    error!(error = %e, "presence sweep failed");
                }
            }
        })
    }
}
