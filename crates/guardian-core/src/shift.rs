//! Shift window policy.
//!
//! A shift is a per-guard, per-day schedule entry.  There is at most one
//! shift per (guard, day); the store enforces this with a unique index.
//! Overnight shifts have `end <= start` and wrap past midnight.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::types::{GuardId, ShiftId};

/// A scheduled shift.  Times are local-clock hour:minute on the shift's day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Shift {
    pub id: ShiftId,
    pub guard_id: GuardId,
    pub day: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Shift {
    /// Whether the shift wraps past midnight.
    pub fn is_overnight(&self) -> bool {
        self.end <= self.start
    }

    /// Whether `now` (a local-clock time of day) falls inside the shift
    /// window.
    ///
    /// Same-day shift: `start <= now < end`.  Overnight shift
    /// (`end <= start`): `now >= start || now < end`.  A guard with no shift
    /// recorded for the day is outside any window; that case is the caller's
    /// to handle since this type only exists for recorded shifts.
    pub fn window_contains(&self, now: NaiveTime) -> bool {
        if self.is_overnight() {
            now >= self.start || now < self.end
        } else {
            now >= self.start && now < self.end
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shift(start: (u32, u32), end: (u32, u32)) -> Shift {
        Shift {
            id: ShiftId::new(),
            guard_id: GuardId::new(),
            day: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            start: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
        }
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn same_day_window() {
        let s = shift((8, 0), (16, 0));
        assert!(!s.is_overnight());
        assert!(s.window_contains(t(8, 0)), "start is inclusive");
        assert!(s.window_contains(t(12, 30)));
        assert!(!s.window_contains(t(16, 0)), "end is exclusive");
        assert!(!s.window_contains(t(7, 59)));
    }

    #[test]
    fn overnight_window() {
        let s = shift((22, 0), (6, 0));
        assert!(s.is_overnight());
        assert!(s.window_contains(t(23, 30)));
        assert!(s.window_contains(t(2, 0)));
        assert!(!s.window_contains(t(12, 0)));
        assert!(s.window_contains(t(22, 0)), "start is inclusive");
        assert!(!s.window_contains(t(6, 0)), "end is exclusive");
    }

    #[test]
    fn zero_length_window_reads_as_full_day() {
        // start == end is interpreted as overnight, which accepts every
        // time of day.  Administrators use this for 24h posts.
        let s = shift((8, 0), (8, 0));
        assert!(s.is_overnight());
        assert!(s.window_contains(t(8, 0)));
        assert!(s.window_contains(t(0, 0)));
        assert!(s.window_contains(t(23, 59)));
    }

    #[test]
    fn minute_precision() {
        let s = shift((8, 30), (16, 45));
        assert!(!s.window_contains(t(8, 29)));
        assert!(s.window_contains(t(8, 30)));
        assert!(s.window_contains(t(16, 44)));
        assert!(!s.window_contains(t(16, 45)));
    }
}
