use bustrack_core::config::TrackingConfig;
use bustrack_core::ingest::LocationReport;
use bustrack_core::location_fix::{NewFix, VehicleId};
use bustrack_core::vehicle_registry::StaticVehicleRegistry;
use bustrack_core::Tracker;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

// Bangalore, roughly Majestic bus stand
pub const CENTER_LAT: f64 = 12.9767;
pub const CENTER_LNG: f64 = 77.5713;

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn new_fix(vehicle_id: VehicleId, lat: f64, lng: f64, secs: i64) -> NewFix {
    NewFix {
        vehicle_id,
        latitude: lat,
        longitude: lng,
        speed: Some(25.0),
        heading: Some(90.0),
        accuracy: None,
        timestamp: ts(secs),
    }
}

pub fn report(vehicle_id: VehicleId, lat: f64, lng: f64) -> LocationReport {
    LocationReport {
        vehicle_id: Some(vehicle_id),
        latitude: Some(lat),
        longitude: Some(lng),
        ..Default::default()
    }
}

/// Vehicles `1..=num_of_vehicles` are registered.
pub fn tracker_with_config(num_of_vehicles: i64, config: TrackingConfig) -> Arc<Tracker> {
    let registry = StaticVehicleRegistry::with_vehicles(1..=num_of_vehicles);
    Arc::new(Tracker::open(config, Arc::new(registry)).unwrap())
}

pub fn in_memory_tracker(num_of_vehicles: i64) -> Arc<Tracker> {
    tracker_with_config(num_of_vehicles, TrackingConfig::default())
}
