//! Geofence validation.
//!
//! A location's geofence is a circle of `radius_m` meters around its
//! coordinates.  Acceptance uses the great-circle (haversine) distance; the
//! boundary is **inclusive** (`distance <= radius`), so a sample exactly at
//! the radius is accepted.

use serde::{Deserialize, Serialize};

use crate::models::Location;

/// Acceptance radius in meters when a location has none configured.
pub const DEFAULT_RADIUS_M: f64 = 30.0;

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A single observed coordinate sample.  Accuracy is the caller's problem;
/// the engine evaluates exactly one sample per attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// A sample is usable only if both components are finite and in range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude.abs() <= 90.0
            && self.longitude.abs() <= 180.0
    }
}

/// Result of evaluating a sample against a location's geofence.
///
/// Invalid input (NaN, out-of-range coordinates) rejects the sample rather
/// than raising a fault.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeofenceCheck {
    Inside { distance_m: f64, radius_m: f64 },
    Outside { distance_m: f64, radius_m: f64 },
    Invalid,
}

impl GeofenceCheck {
    pub fn accepted(&self) -> bool {
        matches!(self, GeofenceCheck::Inside { .. })
    }
}

/// Great-circle distance between two coordinates in meters.
///
/// Standard haversine formula with radians conversion; stable across the
/// antimeridian and near the poles, unlike a planar approximation.
pub fn haversine_distance_m(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Evaluate a sample against a location's geofence.
pub fn evaluate(sample: Coordinate, location: &Location) -> GeofenceCheck {
    if !sample.is_valid() {
        return GeofenceCheck::Invalid;
    }

    let center = Coordinate::new(location.latitude, location.longitude);
    if !center.is_valid() {
        return GeofenceCheck::Invalid;
    }

    let radius_m = match location.radius_m {
        Some(r) if r > 0.0 => r,
        _ => DEFAULT_RADIUS_M,
    };

    let distance_m = haversine_distance_m(sample, center);
    if distance_m <= radius_m {
        GeofenceCheck::Inside {
            distance_m,
            radius_m,
        }
    } else {
        GeofenceCheck::Outside {
            distance_m,
            radius_m,
        }
    }
}
