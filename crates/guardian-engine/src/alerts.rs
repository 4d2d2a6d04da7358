//! Panic alert fan-out.
//!
//! Triggering an alert appends it to the durable store and pushes a notice
//! to every subscriber; an administrator reset clears the whole table and
//! pushes a clearance.  Delivery is at-least-once: the broadcast channel
//! may drop notices for a slow subscriber, who must then reconcile with one
//! [`PanicChannel::snapshot`] full read.
//!
//! Every mutation bumps a monotonic fetch token, and `snapshot` reads the
//! token and the rows under the same store lock the mutations hold.  An
//! observer keeps the highest token it has seen and discards anything
//! older, so a clearance can never be shadowed by a stale re-read: reset
//! always wins.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use guardian_core::{AlertId, PanicAlert};

use crate::{Result, SharedDb};

const ALERT_CHANNEL_CAPACITY: usize = 64;

/// Pushed to subscribers on every alert mutation.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertNotice {
    Raised { alert: PanicAlert, token: u64 },
    Cleared { token: u64 },
}

impl AlertNotice {
    pub fn token(&self) -> u64 {
        match self {
            AlertNotice::Raised { token, .. } | AlertNotice::Cleared { token } => *token,
        }
    }
}

/// A linearizable full read of the outstanding alerts.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AlertSnapshot {
    pub token: u64,
    pub alerts: Vec<PanicAlert>,
}

pub struct PanicChannel {
    db: SharedDb,
    tx: broadcast::Sender<AlertNotice>,
    token: AtomicU64,
}

impl PanicChannel {
    pub fn new(db: SharedDb) -> Self {
        let (tx, _) = broadcast::channel(ALERT_CHANNEL_CAPACITY);
        Self {
            db,
            tx,
            token: AtomicU64::new(0),
        }
    }

    /// Raise an alert: durably record it, then notify all subscribers.
    pub async fn trigger(
        &self,
        guard_name: String,
        location: String,
        now: DateTime<Utc>,
    ) -> Result<PanicAlert> {
        let alert = PanicAlert {
            id: AlertId::new(),
            guard_name,
            location,
            timestamp: now,
        };

        // Mutation and token bump happen under the store lock so snapshots
        // interleave cleanly with them.
        let db = self.db.lock().await;
        db.insert_alert(&alert)?;
        let token = self.token.fetch_add(1, Ordering::SeqCst) + 1;
        let receivers = self.tx.send(AlertNotice::Raised {
            alert: alert.clone(),
            token,
        });
        drop(db);

        warn!(
            guard = %alert.guard_name,
            location = %alert.location,
            subscribers = receivers.map(|n| n as u64).unwrap_or(0),
            "panic alert raised"
        );
        Ok(alert)
    }

    /// Clear every outstanding alert and notify subscribers.  Idempotent:
    /// repeated resets converge to "no outstanding alerts".
    pub async fn reset(&self) -> Result<usize> {
        let db = self.db.lock().await;
        let cleared = db.clear_alerts()?;
        let token = self.token.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.tx.send(AlertNotice::Cleared { token });
        drop(db);

        info!(cleared, "panic alerts reset");
        Ok(cleared)
    }

    /// Full read of the outstanding alerts, tagged with the current fetch
    /// token.  Used as the polling fallback and by lagged subscribers.
    pub async fn snapshot(&self) -> Result<AlertSnapshot> {
        let db = self.db.lock().await;
        let alerts = db.outstanding_alerts()?;
        let token = self.token.load(Ordering::SeqCst);
        drop(db);

        Ok(AlertSnapshot { token, alerts })
    }

    /// Subscribe to push notices.  A receiver that sees
    /// [`broadcast::error::RecvError::Lagged`] must reconcile with
    /// [`Self::snapshot`]; duplicates are harmless.
    pub fn subscribe(&self) -> broadcast::Receiver<AlertNotice> {
        self.tx.subscribe()
    }
}
