use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::broadcast_hub::{BroadcastHub, Topic};
use crate::error::{check_latitude, check_longitude, TrackingError};
use crate::latest_index::LatestIndex;
use crate::location_fix::{LocationFix, NewFix, VehicleId};
use crate::location_store::LocationStore;
use crate::vehicle_registry::{VehicleMetadata, VehicleRegistry};

/// Body of `POST /locations` as sent by a GPS device. Everything is optional
/// here so that a missing field can be reported by name instead of as a
/// generic decode failure.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct LocationReport {
    #[serde(alias = "bus_id")]
    pub vehicle_id: Option<VehicleId>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub accuracy: Option<f64>,
    pub timestamp: Option<String>,
}

impl LocationReport {
    pub fn parse(body: &[u8]) -> Result<Self, TrackingError> {
        serde_json::from_slice(body)
            .map_err(|e| TrackingError::malformed(format!("invalid location payload: {e}")))
    }

    /// Checks fields in declaration order and stops at the first bad one.
    /// `now` stands in for a missing timestamp.
    pub fn validate(self, now: DateTime<Utc>) -> Result<NewFix, TrackingError> {
        let vehicle_id = self.vehicle_id.ok_or_else(|| missing("vehicle_id"))?;
        let latitude = check_latitude(self.latitude.ok_or_else(|| missing("latitude"))?)?;
        let longitude = check_longitude(self.longitude.ok_or_else(|| missing("longitude"))?)?;
        let timestamp = match self.timestamp.as_deref() {
            None => now,
            Some(s) => parse_timestamp(s)?,
        };
        Ok(NewFix {
            vehicle_id,
            latitude,
            longitude,
            speed: self.speed,
            heading: self.heading,
            accuracy: self.accuracy,
            timestamp,
        })
    }
}

fn missing(field: &str) -> TrackingError {
    TrackingError::malformed(format!("missing required field: {field}"))
}

/// RFC3339, or ISO-8601 without an offset (read as UTC), or a bare date.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, TrackingError> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(t.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
        .ok_or_else(|| TrackingError::malformed(format!("invalid timestamp: {s}")))
}

/// Payload of the realtime `location_update` event.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LocationUpdate {
    pub bus_id: VehicleId,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub timestamp: DateTime<Utc>,
    /// False when a newer fix for the vehicle was already indexed, so the
    /// vehicle's current position did not move.
    pub is_latest: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<VehicleMetadata>,
}

impl LocationUpdate {
    pub fn new(fix: &LocationFix, is_latest: bool, vehicle: Option<VehicleMetadata>) -> Self {
        LocationUpdate {
            bus_id: fix.vehicle_id,
            latitude: fix.latitude,
            longitude: fix.longitude,
            speed: fix.speed,
            heading: fix.heading,
            timestamp: fix.timestamp,
            is_latest,
            vehicle,
        }
    }
}

/// The only write path into store, index and hub.
pub struct IngestService {
    registry: Arc<dyn VehicleRegistry>,
    store: Arc<LocationStore>,
    index: Arc<LatestIndex>,
    hub: Arc<BroadcastHub<LocationUpdate>>,
}

impl IngestService {
    pub fn new(
        registry: Arc<dyn VehicleRegistry>,
        store: Arc<LocationStore>,
        index: Arc<LatestIndex>,
        hub: Arc<BroadcastHub<LocationUpdate>>,
    ) -> Self {
        Self {
            registry,
            store,
            index,
            hub,
        }
    }

    pub fn ingest(&self, report: LocationReport) -> Result<Arc<LocationFix>, TrackingError> {
        let fix = report.validate(Utc::now()).inspect_err(|e| {
            info!("[ingest] rejected location report: {}", e);
        })?;
        self.ingest_fix(fix)
    }

    /// Returns once the fix is logged and indexed. Delivery to realtime
    /// subscribers only gets queued.
    pub fn ingest_fix(&self, fix: NewFix) -> Result<Arc<LocationFix>, TrackingError> {
        check_latitude(fix.latitude)?;
        check_longitude(fix.longitude)?;
        let vehicle_id = fix.vehicle_id;
        if !self.registry.exists(vehicle_id) {
            info!("[ingest] rejected fix for unknown vehicle {}", vehicle_id);
            return Err(TrackingError::UnknownVehicle(vehicle_id));
        }
        let metadata = self.registry.metadata(vehicle_id);

        let (stored, num_of_sessions) = self
            .store
            .append_then(fix, |stored| {
                let is_latest = self.index.update(stored.clone());
                self.hub.publish_all(
                    &[Topic::Tracking, Topic::Vehicle(vehicle_id)],
                    LocationUpdate::new(stored, is_latest, metadata),
                )
            })
            .map_err(TrackingError::Transient)?;

        debug!(
            "[ingest] vehicle {} fix seq={} at ({}, {}), pushed to {} sessions",
            vehicle_id, stored.ingestion_seq, stored.latitude, stored.longitude, num_of_sessions
        );
        Ok(stored)
    }
}
