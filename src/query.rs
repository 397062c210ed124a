use serde::Deserialize;
use std::sync::Arc;

use crate::error::TrackingError;
use crate::geofence::{self, Circle, GeofenceResult};
use crate::ingest::parse_timestamp;
use crate::latest_index::LatestIndex;
use crate::location_fix::{LocationFix, VehicleId};
use crate::location_store::{LocationStore, TimeRange};

/// Query string of `GET /locations/{vehicle_id}`.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    #[serde(alias = "start_time")]
    pub start: Option<String>,
    #[serde(alias = "end_time")]
    pub end: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HistoryQuery {
    pub range: TimeRange,
    pub limit: Option<usize>,
}

impl TryFrom<HistoryParams> for HistoryQuery {
    type Error = TrackingError;

    fn try_from(params: HistoryParams) -> Result<Self, Self::Error> {
        let start = params.start.as_deref().map(parse_timestamp).transpose()?;
        let end = params.end.as_deref().map(parse_timestamp).transpose()?;
        Ok(HistoryQuery {
            range: TimeRange::new(start, end),
            limit: params.limit,
        })
    }
}

/// Query string of `GET /locations`.
#[derive(Debug, Default, Deserialize)]
pub struct LocationsParams {
    pub active_only: Option<String>,
    pub bus_id: Option<VehicleId>,
}

impl LocationsParams {
    /// Anything but a case-insensitive "true" is false; absent means true.
    pub fn active_only(&self) -> bool {
        self.active_only
            .as_deref()
            .map_or(true, |s| s.eq_ignore_ascii_case("true"))
    }
}

/// Body of `POST /geofence-check`.
#[derive(Debug, Default, Deserialize)]
pub struct GeofenceRequest {
    #[serde(alias = "bus_id")]
    pub vehicle_id: Option<VehicleId>,
    pub center_lat: Option<f64>,
    pub center_lng: Option<f64>,
    pub radius_meters: Option<f64>,
}

impl GeofenceRequest {
    pub fn parse(body: &[u8]) -> Result<Self, TrackingError> {
        serde_json::from_slice(body)
            .map_err(|e| TrackingError::malformed(format!("invalid geofence payload: {e}")))
    }

    pub fn validate(&self) -> Result<(VehicleId, Circle), TrackingError> {
        let field = |name: &str| TrackingError::malformed(format!("missing required field: {name}"));
        let vehicle_id = self.vehicle_id.ok_or_else(|| field("vehicle_id"))?;
        let center_lat = self.center_lat.ok_or_else(|| field("center_lat"))?;
        let center_lng = self.center_lng.ok_or_else(|| field("center_lng"))?;
        let radius_meters = self.radius_meters.ok_or_else(|| field("radius_meters"))?;
        Ok((vehicle_id, Circle::new(center_lat, center_lng, radius_meters)?))
    }
}

/// Read side. Never touches the broadcast hub.
pub struct LocationQueries {
    store: Arc<LocationStore>,
    index: Arc<LatestIndex>,
    default_history_limit: usize,
}

impl LocationQueries {
    pub fn new(
        store: Arc<LocationStore>,
        index: Arc<LatestIndex>,
        default_history_limit: usize,
    ) -> Self {
        Self {
            store,
            index,
            default_history_limit,
        }
    }

    /// Newest first. A vehicle without fixes yields an empty list.
    pub fn history(&self, vehicle_id: VehicleId, query: &HistoryQuery) -> Vec<Arc<LocationFix>> {
        let limit = query.limit.unwrap_or(self.default_history_limit);
        self.store.history(vehicle_id, query.range, limit)
    }

    pub fn latest(&self, vehicle_id: VehicleId) -> Result<Arc<LocationFix>, TrackingError> {
        self.index.get(vehicle_id)
    }

    /// `active_only` gives the latest fix per vehicle and silently leaves out
    /// vehicles that have none, unlike `latest` which fails.
    pub fn locations(&self, params: &LocationsParams) -> Vec<Arc<LocationFix>> {
        let cap = self.store.history_limit_cap();
        match (params.active_only(), params.bus_id) {
            (true, Some(vehicle_id)) => self.index.get(vehicle_id).into_iter().collect(),
            (true, None) => self.store.latest_of_each(),
            (false, Some(vehicle_id)) => self.store.history(vehicle_id, TimeRange::default(), cap),
            (false, None) => self.store.all_fixes(cap),
        }
    }

    pub fn geofence(&self, request: &GeofenceRequest) -> Result<GeofenceResult, TrackingError> {
        let (vehicle_id, circle) = request.validate()?;
        geofence::check(&self.index, vehicle_id, &circle)
    }
}
