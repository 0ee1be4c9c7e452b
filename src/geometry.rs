use serde::Serialize;

use crate::common::*;

/// A point in the ephemeris frame, in km.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Position {
    /// x coordinate
    pub x: f64,
    /// y coordinate
    pub y: f64,
    /// z coordinate
    pub z: f64,
}

impl Position {
    /// Creates a new position.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Euclidean distance between two points, in km.
pub fn distance(a: &Position, b: &Position) -> f64 {
    let (dx, dy, dz) = (a.x - b.x, a.y - b.y, a.z - b.z);
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// One-way propagation latency over `distance_km`, in seconds.
pub fn propagation_latency(distance_km: f64) -> f64 {
    distance_km / SIGNAL_SPEED_KM_S
}

/// Visibility test between the relay and a ground point.
///
/// A point is covered when its slant range to the relay does not exceed the
/// hypotenuse of the footprint radius and the relay altitude. This is a cone
/// approximation, not a true horizon test: it ignores Earth curvature and the
/// actual sub-relay point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverageModel {
    max_range_km: f64,
}

impl Default for CoverageModel {
    fn default() -> Self {
        Self::new(COVERAGE_RADIUS_KM, RELAY_ALTITUDE_KM)
    }
}

impl CoverageModel {
    /// Creates a coverage model from a footprint radius and relay altitude.
    pub fn new(coverage_radius_km: f64, relay_altitude_km: f64) -> Self {
        Self {
            max_range_km: coverage_radius_km.hypot(relay_altitude_km),
        }
    }

    /// Largest slant range still considered in coverage, km.
    pub fn max_range_km(&self) -> f64 {
        self.max_range_km
    }

    /// Whether a ground point `distance_km` away from the relay is covered.
    pub fn in_coverage(&self, distance_km: f64) -> bool {
        distance_km <= self.max_range_km
    }
}
