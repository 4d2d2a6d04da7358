//! Per-guard check-in deadline timers.
//!
//! Each on-duty guard owns one cancelable timer.  The state machine per
//! guard:
//!
//! ```text
//!                 arm (clock-in)
//!  NoDeadline ─────────────────────► Armed(deadline)
//!      ▲                                │        │
//!      │ disarm (clock-out)            confirm   │ deadline elapses
//!      └────────────────────────────── (check-in)│ unconfirmed
//!                                        │       ▼
//!                                        └── re-armed at now + interval,
//!                                            emitting a lapse on expiry
//! ```
//!
//! - `arm` starts a fresh window from the clock-in timestamp.
//! - `confirm` (a successful check-in) re-arms from the check-in timestamp.
//! - Expiry emits a [`CheckInLapse`] on the broadcast channel and re-arms,
//!   so the guard gets a fresh window rather than being stuck expired.
//! - `disarm` aborts the timer task; no lapse can be emitted afterwards.
//!
//! A failed check-in never reaches `confirm`, so it leaves the armed
//! deadline untouched.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use guardian_core::GuardId;

const LAPSE_CHANNEL_CAPACITY: usize = 64;

/// Emitted when a guard's check-in deadline elapses unconfirmed.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct CheckInLapse {
    pub guard_id: GuardId,
    /// The deadline that was missed.
    pub deadline: DateTime<Utc>,
}

struct GuardTimer {
    deadline: DateTime<Utc>,
    /// Ownership marker: a timer task may only touch the map entry it was
    /// spawned for.
    generation: u64,
    task: JoinHandle<()>,
}

impl Drop for GuardTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Arena of per-guard check-in timers.
pub struct CheckInScheduler {
    /// Check-in interval.  Any positive duration; 60 minutes by default in
    /// the server config.
    interval: Duration,
    timers: Arc<RwLock<HashMap<GuardId, GuardTimer>>>,
    generations: AtomicU64,
    tx: broadcast::Sender<CheckInLapse>,
}

impl CheckInScheduler {
    pub fn new(interval: Duration) -> Self {
        let (tx, _) = broadcast::channel(LAPSE_CHANNEL_CAPACITY);
        Self {
            interval,
            timers: Arc::new(RwLock::new(HashMap::new())),
            generations: AtomicU64::new(0),
            tx,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Arm (or re-arm) the timer for a guard, basing the deadline on `from`.
    /// Returns the new deadline.  Any previous timer for the guard is
    /// canceled by replacement.
    pub async fn arm(&self, guard_id: GuardId, from: DateTime<Utc>) -> DateTime<Utc> {
        let deadline = from + self.interval;
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let task = self.spawn_timer(guard_id, deadline, generation);

        let mut timers = self.timers.write().await;
        timers.insert(
            guard_id,
            GuardTimer {
                deadline,
                generation,
                task,
            },
        );
        debug!(guard = %guard_id, deadline = %deadline, "check-in timer armed");
        deadline
    }

    /// A successful check-in: re-arm from the check-in timestamp.
    pub async fn confirm(&self, guard_id: GuardId, at: DateTime<Utc>) -> DateTime<Utc> {
        info!(guard = %guard_id, "check-in confirmed");
        self.arm(guard_id, at).await
    }

    /// Clock-out: cancel the guard's timer.  No lapse fires afterwards.
    pub async fn disarm(&self, guard_id: GuardId) {
        if self.timers.write().await.remove(&guard_id).is_some() {
            debug!(guard = %guard_id, "check-in timer disarmed");
        }
    }

    /// The currently armed deadline for a guard, if any.
    pub async fn deadline(&self, guard_id: GuardId) -> Option<DateTime<Utc>> {
        self.timers.read().await.get(&guard_id).map(|t| t.deadline)
    }

    /// Subscribe to missed-deadline transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<CheckInLapse> {
        self.tx.subscribe()
    }

    fn spawn_timer(
        &self,
        guard_id: GuardId,
        mut deadline: DateTime<Utc>,
        generation: u64,
    ) -> JoinHandle<()> {
        let timers = Arc::clone(&self.timers);
        let tx = self.tx.clone();
        let interval = self.interval;

        tokio::spawn(async move {
            loop {
                let wait = (deadline - Utc::now()).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;

                // Emit and re-arm atomically with respect to the arena, and
                // only if this task still owns the entry: a concurrent
                // confirm or disarm supersedes it.
                let missed = {
                    let mut timers = timers.write().await;
                    match timers.get_mut(&guard_id) {
                        Some(t) if t.generation == generation => {
                            let missed = t.deadline;
                            deadline = Utc::now() + interval;
                            t.deadline = deadline;
                            missed
                        }
                        _ => break,
                    }
                };

                warn!(guard = %guard_id, deadline = %missed, "check-in deadline missed");
                let _ = tx.send(CheckInLapse {
                    guard_id,
                    deadline: missed,
                });
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration as StdDuration};

    fn scheduler(minutes: i64) -> CheckInScheduler {
        CheckInScheduler::new(Duration::minutes(minutes))
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_emits_lapse_with_armed_deadline() {
        let sched = scheduler(60);
        let mut rx = sched.subscribe();

        let guard_id = GuardId::new();
        let from = Utc::now();
        let deadline = sched.arm(guard_id, from).await;
        assert_eq!(deadline, from + Duration::minutes(60));

        let lapse = timeout(StdDuration::from_secs(7200), rx.recv())
            .await
            .expect("timer should fire")
            .unwrap();
        assert_eq!(lapse.guard_id, guard_id);
        assert_eq!(lapse.deadline, deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_re_arms_for_a_fresh_window() {
        let sched = scheduler(60);
        let mut rx = sched.subscribe();

        let guard_id = GuardId::new();
        sched.arm(guard_id, Utc::now()).await;

        let first = timeout(StdDuration::from_secs(7200), rx.recv())
            .await
            .expect("first lapse")
            .unwrap();
        let second = timeout(StdDuration::from_secs(7200), rx.recv())
            .await
            .expect("second lapse")
            .unwrap();
        assert!(second.deadline > first.deadline);
        assert!(sched.deadline(guard_id).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_cancels_without_firing() {
        let sched = scheduler(60);
        let mut rx = sched.subscribe();

        let guard_id = GuardId::new();
        sched.arm(guard_id, Utc::now()).await;
        sched.disarm(guard_id).await;
        assert!(sched.deadline(guard_id).await.is_none());

        let waited = timeout(StdDuration::from_secs(10_800), rx.recv()).await;
        assert!(waited.is_err(), "no lapse may fire after disarm");
    }

    #[tokio::test(start_paused = true)]
    async fn confirm_extends_the_deadline() {
        let sched = scheduler(60);

        let guard_id = GuardId::new();
        let t0 = Utc::now();
        sched.arm(guard_id, t0).await;

        let confirmed_at = t0 + Duration::minutes(30);
        let next = sched.confirm(guard_id, confirmed_at).await;
        assert_eq!(next, confirmed_at + Duration::minutes(60));
        assert_eq!(sched.deadline(guard_id).await, Some(next));
    }

    #[tokio::test(start_paused = true)]
    async fn guards_are_independent() {
        let sched = scheduler(60);
        let mut rx = sched.subscribe();

        let a = GuardId::new();
        let b = GuardId::new();
        sched.arm(a, Utc::now()).await;
        sched.arm(b, Utc::now()).await;
        sched.disarm(a).await;

        let lapse = timeout(StdDuration::from_secs(7200), rx.recv())
            .await
            .expect("b's timer should still fire")
            .unwrap();
        assert_eq!(lapse.guard_id, b);
    }
}
