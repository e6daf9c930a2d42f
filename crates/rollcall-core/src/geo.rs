//! Great-circle distance and geofence checks.
//!
//! Coordinates may be rounded to a fixed number of decimal places before the
//! distance is measured. At the default precision of 2 places this snaps both
//! points to a grid of roughly 1.1 km, so two readings from the same lecture
//! hall compare as identical even when phone GPS drifts. The rounding is a
//! deliberate tolerance and is configurable through
//! [`AttendanceConfig`](crate::config::AttendanceConfig).

use crate::config::AttendanceConfig;
use crate::error::{AttendanceError, Result};
use crate::types::Coordinates;

/// Mean earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance in meters between two points in decimal degrees.
#[must_use]
pub fn haversine(a: Coordinates, b: Coordinates) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_METERS * c
}

/// Round a degree value to `places` decimal places, half away from zero.
#[must_use]
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10_f64.powi(i32::try_from(places).unwrap_or(i32::MAX));
    (value * factor).round() / factor
}

/// Geofence check between a student and the code location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoValidator {
    max_meters: f64,
    precision: Option<u32>,
}

impl GeoValidator {
    /// Create a validator with an explicit threshold and optional rounding.
    #[must_use]
    pub const fn new(max_meters: f64, precision: Option<u32>) -> Self {
        Self {
            max_meters,
            precision,
        }
    }

    /// Create a validator from the attendance configuration.
    #[must_use]
    pub const fn from_config(config: &AttendanceConfig) -> Self {
        Self::new(config.geofence_meters, config.precision())
    }

    /// Configured threshold in meters.
    #[must_use]
    pub const fn max_meters(&self) -> f64 {
        self.max_meters
    }

    fn normalize(&self, point: Coordinates) -> Coordinates {
        match self.precision {
            Some(places) => Coordinates {
                latitude: round_to(point.latitude, places),
                longitude: round_to(point.longitude, places),
            },
            None => point,
        }
    }

    /// Distance in meters after rounding.
    #[must_use]
    pub fn distance(&self, student: Coordinates, reference: Coordinates) -> f64 {
        haversine(self.normalize(student), self.normalize(reference))
    }

    /// Whether the student is within the geofence.
    #[must_use]
    pub fn within_range(&self, student: Coordinates, reference: Coordinates) -> bool {
        self.distance(student, reference) <= self.max_meters
    }

    /// Like [`within_range`](Self::within_range) but fails closed with an error.
    ///
    /// # Errors
    ///
    /// Returns [`AttendanceError::LocationOutOfRange`] when the distance
    /// exceeds the threshold.
    pub fn check(&self, student: Coordinates, reference: Coordinates) -> Result<f64> {
        let distance = self.distance(student, reference);
        if distance > self.max_meters {
            return Err(AttendanceError::LocationOutOfRange {
                distance_meters: distance,
                max_meters: self.max_meters,
            });
        }
        Ok(distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(latitude: f64, longitude: f64) -> Coordinates {
        Coordinates {
            latitude,
            longitude,
        }
    }

    #[test]
    fn test_haversine_zero_distance() {
        assert!(haversine(point(0.0, 0.0), point(0.0, 0.0)).abs() < f64::EPSILON);
        assert!(haversine(point(6.5244, 3.3792), point(6.5244, 3.3792)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_haversine_is_symmetric() {
        let pairs = [
            (point(6.5244, 3.3792), point(9.0765, 7.3986)),
            (point(-33.8688, 151.2093), point(51.5074, -0.1278)),
            (point(0.0, 179.9), point(0.0, -179.9)),
        ];
        for (a, b) in pairs {
            assert!((haversine(a, b) - haversine(b, a)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_haversine_known_distance() {
        // one degree of longitude at the equator
        let d = haversine(point(0.0, 0.0), point(0.0, 1.0));
        assert!((d - 111_194.93).abs() < 1.0, "got {d}");
    }

    #[test]
    fn test_round_to() {
        assert!((round_to(6.5251, 2) - 6.53).abs() < 1e-9);
        assert!((round_to(-3.3749, 2) - -3.37).abs() < 1e-9);
        assert!((round_to(1.0, 0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_same_point_always_within_range() {
        for max in [0.1, 1.0, 50.0, 10_000.0] {
            for precision in [None, Some(2)] {
                let geo = GeoValidator::new(max, precision);
                let p = point(6.5244, 3.3792);
                assert!(geo.within_range(p, p));
            }
        }
    }

    #[test]
    fn test_rounding_absorbs_small_drift() {
        // ~47 m apart, both round to (6.52, 3.38)
        let a = point(6.5210, 3.3810);
        let b = point(6.5213, 3.3813);
        assert!(GeoValidator::new(15.0, Some(2)).within_range(a, b));
        assert!(!GeoValidator::new(15.0, None).within_range(a, b));
    }

    #[test]
    fn test_check_fails_closed() {
        let geo = GeoValidator::new(50.0, Some(2));
        let err = geo
            .check(point(6.52, 3.38), point(6.60, 3.38))
            .unwrap_err();
        match err {
            AttendanceError::LocationOutOfRange {
                distance_meters,
                max_meters,
            } => {
                assert!(distance_meters > 8_000.0);
                assert!((max_meters - 50.0).abs() < f64::EPSILON);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_config() {
        let geo = GeoValidator::from_config(&AttendanceConfig::default());
        assert!((geo.max_meters() - 50.0).abs() < f64::EPSILON);
    }
}
