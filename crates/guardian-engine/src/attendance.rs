//! The gated attendance write path.
//!
//! Every clock-in, clock-out and check-in attempt flows through
//! [`AttendanceService::apply`]: directory lookups first (configuration
//! errors stop the attempt before anything is recorded), then the shift
//! window policy (clock operations only), then the geofence.  A policy
//! rejection still appends an event — with `outcome = Failed` — so the log
//! keeps a complete record of attempts; only the receipt tells the guard
//! why.

use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use guardian_core::geofence::{self, Coordinate, GeofenceCheck};
use guardian_core::{
    AttendanceEvent, ConfigIssue, EventId, EventKind, EventOutcome, GuardId,
};

use crate::scheduler::CheckInScheduler;
use crate::{Result, SharedDb};

/// Why an attempt was rejected by policy.  Expected in normal operation and
/// deliberately not an error: the caller shows it to the guard, who must
/// physically move or wait rather than retry blindly.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    OutsideShiftWindow { start: NaiveTime, end: NaiveTime },
    TooFar { distance_m: f64, radius_m: f64 },
    InvalidCoordinates,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::OutsideShiftWindow { start, end } => {
                write!(f, "outside shift window {start}-{end}")
            }
            RejectReason::TooFar {
                distance_m,
                radius_m,
            } => write!(f, "{distance_m:.0} m from post (radius {radius_m:.0} m)"),
            RejectReason::InvalidCoordinates => write!(f, "invalid coordinates"),
        }
    }
}

/// What happened to one attempt.  The event id always refers to a recorded
/// event, whether the attempt succeeded or was rejected.
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceReceipt {
    pub event_id: EventId,
    pub kind: EventKind,
    pub outcome: EventOutcome,
    pub recorded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<RejectReason>,
    /// The guard's next check-in deadline after this attempt, if armed.
    pub next_check_in_due: Option<DateTime<Utc>>,
}

impl AttendanceReceipt {
    pub fn accepted(&self) -> bool {
        self.outcome == EventOutcome::Success
    }
}

pub struct AttendanceService {
    db: SharedDb,
    scheduler: Arc<CheckInScheduler>,
    /// Offset mapping UTC instants onto the local clock shifts are written
    /// in.
    shift_offset: FixedOffset,
}

impl AttendanceService {
    pub fn new(db: SharedDb, scheduler: Arc<CheckInScheduler>, shift_offset: FixedOffset) -> Self {
        Self {
            db,
            scheduler,
            shift_offset,
        }
    }

    pub async fn clock_in(
        &self,
        guard_id: GuardId,
        sample: Coordinate,
        now: DateTime<Utc>,
    ) -> Result<AttendanceReceipt> {
        self.apply(EventKind::ClockIn, guard_id, sample, now).await
    }

    pub async fn clock_out(
        &self,
        guard_id: GuardId,
        sample: Coordinate,
        now: DateTime<Utc>,
    ) -> Result<AttendanceReceipt> {
        self.apply(EventKind::ClockOut, guard_id, sample, now).await
    }

    pub async fn check_in(
        &self,
        guard_id: GuardId,
        sample: Coordinate,
        now: DateTime<Utc>,
    ) -> Result<AttendanceReceipt> {
        self.apply(EventKind::CheckIn, guard_id, sample, now).await
    }

    async fn apply(
        &self,
        kind: EventKind,
        guard_id: GuardId,
        sample: Coordinate,
        now: DateTime<Utc>,
    ) -> Result<AttendanceReceipt> {
        let local = now.with_timezone(&self.shift_offset);

        // Directory lookups.  Missing configuration aborts the attempt
        // without recording anything.
        let (guard, location, shift) = {
            let db = self.db.lock().await;
            let guard = db.guard(guard_id)?.ok_or(ConfigIssue::UnknownGuard)?;
            let location_id = guard.location_id.ok_or(ConfigIssue::NoAssignedLocation)?;
            let location = db
                .location(location_id)?
                .ok_or(ConfigIssue::UnknownLocation)?;
            // Check-ins are geofence-only; the shift window gates the
            // clock operations.
            let shift = match kind {
                EventKind::ClockIn | EventKind::ClockOut => Some(
                    db.shift_for(guard_id, local.date_naive())?
                        .ok_or(ConfigIssue::NoShiftToday)?,
                ),
                EventKind::CheckIn => None,
            };
            (guard, location, shift)
        };

        let mut rejection = None;
        if let Some(shift) = &shift {
            if !shift.window_contains(local.time()) {
                rejection = Some(RejectReason::OutsideShiftWindow {
                    start: shift.start,
                    end: shift.end,
                });
            }
        }
        if rejection.is_none() {
            rejection = match geofence::evaluate(sample, &location) {
                GeofenceCheck::Inside { .. } => None,
                GeofenceCheck::Outside {
                    distance_m,
                    radius_m,
                } => Some(RejectReason::TooFar {
                    distance_m,
                    radius_m,
                }),
                GeofenceCheck::Invalid => Some(RejectReason::InvalidCoordinates),
            };
        }

        let outcome = if rejection.is_none() {
            EventOutcome::Success
        } else {
            EventOutcome::Failed
        };
        let event = AttendanceEvent {
            id: EventId::new(),
            guard_id,
            guard_name: guard.name.clone(),
            kind,
            timestamp: now,
            outcome,
            location: Some(location.name.clone()),
        };
        self.db.lock().await.append_event(&event)?;

        let next_check_in_due = if outcome == EventOutcome::Success {
            match kind {
                EventKind::ClockIn => Some(self.scheduler.arm(guard_id, now).await),
                EventKind::CheckIn => Some(self.scheduler.confirm(guard_id, now).await),
                EventKind::ClockOut => {
                    self.scheduler.disarm(guard_id).await;
                    None
                }
            }
        } else {
            // A rejected attempt changes nothing; report whatever deadline
            // is still armed.
            self.scheduler.deadline(guard_id).await
        };

        match &rejection {
            None => info!(
                guard = %guard_id,
                kind = kind.as_str(),
                "attendance event recorded"
            ),
            // Routine, guard-facing outcome: info, not error.
            Some(reason) => info!(
                guard = %guard_id,
                kind = kind.as_str(),
                reason = %reason,
                "attendance attempt rejected"
            ),
        }

        Ok(AttendanceReceipt {
            event_id: event.id,
            kind,
            outcome,
            recorded_at: now,
            rejection,
            next_check_in_due,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};
    use tokio::sync::Mutex;

    use guardian_core::{derive_presence, DutyState, Guard, Location, LocationId, Shift, ShiftId};
    use guardian_store::Database;

    struct Fixture {
        _dir: tempfile::TempDir,
        db: SharedDb,
        service: AttendanceService,
        scheduler: Arc<CheckInScheduler>,
        guard_id: GuardId,
    }

    // Gate A at the reference coordinates, radius 30 m, shift 08:00-16:00.
    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::open_at(&dir.path().join("test.db")).unwrap();

        let location = Location {
            id: LocationId::new(),
            name: "Gate A".to_string(),
            latitude: 37.7749,
            longitude: -122.4194,
            radius_m: Some(30.0),
        };
        database.insert_location(&location).unwrap();

        let guard = Guard {
            id: GuardId::new(),
            name: "Dana Reyes".to_string(),
            location_id: Some(location.id),
            rank: None,
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
        };
        database.insert_guard(&guard).unwrap();

        database
            .upsert_shift(&Shift {
                id: ShiftId::new(),
                guard_id: guard.id,
                day: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
                start: chrono::NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                end: chrono::NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            })
            .unwrap();

        let db: SharedDb = Arc::new(Mutex::new(database));
        let scheduler = Arc::new(CheckInScheduler::new(Duration::minutes(60)));
        let service = AttendanceService::new(
            Arc::clone(&db),
            Arc::clone(&scheduler),
            FixedOffset::east_opt(0).unwrap(),
        );

        Fixture {
            _dir: dir,
            db,
            service,
            scheduler,
            guard_id: guard.id,
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, h, m, 0).unwrap()
    }

    // ~10 m north of Gate A.
    fn near_post() -> Coordinate {
        Coordinate::new(37.77499, -122.4194)
    }

    // ~600 m north of Gate A.
    fn far_from_post() -> Coordinate {
        Coordinate::new(37.7803, -122.4194)
    }

    #[tokio::test]
    async fn clock_in_near_post_in_window_is_recorded_late() {
        let fx = fixture().await;

        let receipt = fx
            .service
            .clock_in(fx.guard_id, near_post(), at(8, 5))
            .await
            .unwrap();
        assert!(receipt.accepted());
        assert_eq!(receipt.next_check_in_due, Some(at(9, 5)));

        let db = fx.db.lock().await;
        let events = db.events_for_guard(fx.guard_id).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome, EventOutcome::Success);

        let guard = db.guard(fx.guard_id).unwrap().unwrap();
        let shift = db
            .shift_for(fx.guard_id, NaiveDate::from_ymd_opt(2025, 6, 2).unwrap())
            .unwrap();
        let status = derive_presence(
            &guard,
            &events,
            shift.as_ref(),
            Duration::minutes(60),
            FixedOffset::east_opt(0).unwrap(),
            at(8, 30),
        )
        .unwrap();
        assert_eq!(status.state, DutyState::Late);
    }

    #[tokio::test]
    async fn check_in_confirms_and_extends_the_deadline() {
        let fx = fixture().await;
        fx.service
            .clock_in(fx.guard_id, near_post(), at(8, 5))
            .await
            .unwrap();

        let receipt = fx
            .service
            .check_in(fx.guard_id, near_post(), at(8, 50))
            .await
            .unwrap();
        assert!(receipt.accepted());
        assert_eq!(receipt.next_check_in_due, Some(at(9, 50)));
        assert_eq!(fx.scheduler.deadline(fx.guard_id).await, Some(at(9, 50)));
    }

    #[tokio::test]
    async fn far_clock_in_records_failed_and_stays_off_duty() {
        let fx = fixture().await;

        let receipt = fx
            .service
            .clock_in(fx.guard_id, far_from_post(), at(8, 5))
            .await
            .unwrap();
        assert!(!receipt.accepted());
        match receipt.rejection {
            Some(RejectReason::TooFar {
                distance_m,
                radius_m,
            }) => {
                assert!((distance_m - 600.0).abs() < 10.0, "got {distance_m}");
                assert_eq!(radius_m, 30.0);
            }
            other => panic!("expected TooFar, got {other:?}"),
        }
        assert_eq!(receipt.next_check_in_due, None);

        let db = fx.db.lock().await;
        let events = db.events_for_guard(fx.guard_id).unwrap();
        assert_eq!(events[0].outcome, EventOutcome::Failed);

        let guard = db.guard(fx.guard_id).unwrap().unwrap();
        let status = derive_presence(
            &guard,
            &events,
            None,
            Duration::minutes(60),
            FixedOffset::east_opt(0).unwrap(),
            at(8, 30),
        );
        assert!(status.is_none(), "failed clock-in must not start a shift");
    }

    #[tokio::test]
    async fn clock_in_outside_shift_window_is_rejected_but_recorded() {
        let fx = fixture().await;

        let receipt = fx
            .service
            .clock_in(fx.guard_id, near_post(), at(6, 0))
            .await
            .unwrap();
        assert!(matches!(
            receipt.rejection,
            Some(RejectReason::OutsideShiftWindow { .. })
        ));

        let db = fx.db.lock().await;
        let events = db.events_for_guard(fx.guard_id).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome, EventOutcome::Failed);
    }

    #[tokio::test]
    async fn failed_check_in_leaves_the_deadline_armed() {
        let fx = fixture().await;
        fx.service
            .clock_in(fx.guard_id, near_post(), at(8, 5))
            .await
            .unwrap();

        let receipt = fx
            .service
            .check_in(fx.guard_id, far_from_post(), at(8, 50))
            .await
            .unwrap();
        assert!(!receipt.accepted());
        // Still the original deadline; the failed attempt confirmed nothing.
        assert_eq!(receipt.next_check_in_due, Some(at(9, 5)));
    }

    #[tokio::test]
    async fn clock_out_disarms_the_scheduler() {
        let fx = fixture().await;
        fx.service
            .clock_in(fx.guard_id, near_post(), at(8, 5))
            .await
            .unwrap();

        let receipt = fx
            .service
            .clock_out(fx.guard_id, near_post(), at(12, 0))
            .await
            .unwrap();
        assert!(receipt.accepted());
        assert_eq!(receipt.next_check_in_due, None);
        assert!(fx.scheduler.deadline(fx.guard_id).await.is_none());
    }

    #[tokio::test]
    async fn check_in_does_not_require_a_shift() {
        let fx = fixture().await;

        // Check-ins never consult the shift schedule.
        let receipt = fx
            .service
            .check_in(fx.guard_id, near_post(), at(8, 30))
            .await;
        assert!(receipt.unwrap().accepted());

        // The clock operations do require one.
        let next_day = Utc.with_ymd_and_hms(2025, 6, 3, 8, 30, 0).unwrap();
        let err = fx
            .service
            .clock_in(fx.guard_id, near_post(), next_day)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::EngineError::Configuration(ConfigIssue::NoShiftToday)
        ));
    }

    #[tokio::test]
    async fn configuration_errors_record_nothing() {
        let fx = fixture().await;

        let unknown = GuardId::new();
        let err = fx
            .service
            .clock_in(unknown, near_post(), at(8, 5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::EngineError::Configuration(ConfigIssue::UnknownGuard)
        ));

        let db = fx.db.lock().await;
        assert!(db.events_for_guard(unknown).unwrap().is_empty());
    }

    #[tokio::test]
    async fn guard_without_location_cannot_attempt() {
        let fx = fixture().await;

        let unassigned = Guard {
            id: GuardId::new(),
            name: "Noor Haddad".to_string(),
            location_id: None,
            rank: None,
            created_at: at(0, 0),
        };
        fx.db.lock().await.insert_guard(&unassigned).unwrap();

        let err = fx
            .service
            .check_in(unassigned.id, near_post(), at(8, 30))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::EngineError::Configuration(ConfigIssue::NoAssignedLocation)
        ));
    }

    #[tokio::test]
    async fn invalid_sample_is_rejected_not_an_error() {
        let fx = fixture().await;

        let receipt = fx
            .service
            .check_in(fx.guard_id, Coordinate::new(f64::NAN, 0.0), at(8, 30))
            .await
            .unwrap();
        assert_eq!(receipt.rejection, Some(RejectReason::InvalidCoordinates));
        assert_eq!(receipt.outcome, EventOutcome::Failed);
    }
}
