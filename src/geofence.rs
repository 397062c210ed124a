use serde::Serialize;
use std::sync::Arc;

use crate::error::{check_latitude, check_longitude, TrackingError};
use crate::latest_index::LatestIndex;
use crate::location_fix::{LocationFix, VehicleId};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two points given in degrees.
pub fn haversine_distance_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();
    let dlat = lat2 - lat1;
    let dlng = (lng2 - lng1).to_radians();
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    // rounding can push `a` a hair above 1 for antipodal points
    2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Circle {
    pub center_lat: f64,
    pub center_lng: f64,
    pub radius_meters: f64,
}

impl Circle {
    pub fn new(center_lat: f64, center_lng: f64, radius_meters: f64) -> Result<Self, TrackingError> {
        check_latitude(center_lat)?;
        check_longitude(center_lng)?;
        if !radius_meters.is_finite() || radius_meters < 0.0 {
            return Err(TrackingError::malformed(format!(
                "radius_meters must be a non-negative number, got {radius_meters}"
            )));
        }
        Ok(Self {
            center_lat,
            center_lng,
            radius_meters,
        })
    }

    pub fn distance_to(&self, fix: &LocationFix) -> f64 {
        haversine_distance_m(fix.latitude, fix.longitude, self.center_lat, self.center_lng)
    }
}

#[derive(Clone, Debug)]
pub struct GeofenceResult {
    pub vehicle_id: VehicleId,
    pub is_inside: bool,
    /// Unrounded; `distance_for_display` is what goes on the wire.
    pub distance_meters: f64,
    pub radius_meters: f64,
    pub current_location: Arc<LocationFix>,
}

impl GeofenceResult {
    pub fn distance_for_display(&self) -> f64 {
        (self.distance_meters * 100.0).round() / 100.0
    }
}

#[derive(Serialize)]
pub struct CurrentLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize)]
pub struct GeofenceResponse {
    pub bus_id: VehicleId,
    pub is_inside: bool,
    pub distance_from_center: f64,
    pub radius_meters: f64,
    pub current_location: CurrentLocation,
}

impl From<&GeofenceResult> for GeofenceResponse {
    fn from(result: &GeofenceResult) -> Self {
        GeofenceResponse {
            bus_id: result.vehicle_id,
            is_inside: result.is_inside,
            distance_from_center: result.distance_for_display(),
            radius_meters: result.radius_meters,
            current_location: CurrentLocation {
                latitude: result.current_location.latitude,
                longitude: result.current_location.longitude,
                timestamp: result.current_location.timestamp,
            },
        }
    }
}

/// Evaluates the circle against whatever the index holds right now; nothing
/// is cached between calls.
pub fn check(
    index: &LatestIndex,
    vehicle_id: VehicleId,
    circle: &Circle,
) -> Result<GeofenceResult, TrackingError> {
    let current_location = index.get(vehicle_id)?;
    let distance_meters = circle.distance_to(&current_location);
    Ok(GeofenceResult {
        vehicle_id,
        is_inside: distance_meters <= circle.radius_meters,
        distance_meters,
        radius_meters: circle.radius_meters,
        current_location,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_point_is_zero() {
        assert_eq!(haversine_distance_m(12.9716, 77.5946, 12.9716, 77.5946), 0.0);
    }

    #[test]
    fn one_degree_of_longitude_on_equator() {
        let d = haversine_distance_m(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111_194.93).abs() < 0.01, "{d}");
    }

    #[test]
    fn antipodal_points_do_not_produce_nan() {
        let d = haversine_distance_m(0.0, 0.0, 0.0, 180.0);
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_M).abs() < 1e-6);
    }

    #[test]
    fn rejects_bad_circles() {
        assert!(Circle::new(0.0, 0.0, 0.0).is_ok());
        assert!(matches!(
            Circle::new(0.0, 0.0, -1.0),
            Err(TrackingError::MalformedRequest(_))
        ));
        assert!(matches!(
            Circle::new(91.0, 0.0, 10.0),
            Err(TrackingError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn display_rounding() {
        let fix = Arc::new(
            crate::location_fix::NewFix {
                vehicle_id: 1,
                latitude: 0.0,
                longitude: 0.0,
                speed: None,
                heading: None,
                accuracy: None,
                timestamp: chrono::Utc::now(),
            }
            .sequenced(1),
        );
        let result = GeofenceResult {
            vehicle_id: 1,
            is_inside: false,
            distance_meters: 10.456,
            radius_meters: 10.0,
            current_location: fix,
        };
        assert_eq!(result.distance_for_display(), 10.46);
    }
}
