use anyhow::Result;
use std::sync::Arc;

use crate::broadcast_hub::BroadcastHub;
use crate::config::TrackingConfig;
use crate::error::TrackingError;
use crate::geofence::GeofenceResult;
use crate::ingest::{IngestService, LocationReport, LocationUpdate};
use crate::latest_index::LatestIndex;
use crate::location_db::LocationDb;
use crate::location_fix::{LocationFix, NewFix, VehicleId};
use crate::location_store::LocationStore;
use crate::query::{GeofenceRequest, HistoryQuery, LocationQueries, LocationsParams};
use crate::vehicle_registry::VehicleRegistry;

/// Owns every piece of the tracking core. Built once at startup and shared
/// (behind an `Arc`) with the transport layer.
pub struct Tracker {
    config: TrackingConfig,
    store: Arc<LocationStore>,
    index: Arc<LatestIndex>,
    hub: Arc<BroadcastHub<LocationUpdate>>,
    ingest: IngestService,
    queries: LocationQueries,
}

impl Tracker {
    pub fn open(config: TrackingConfig, registry: Arc<dyn VehicleRegistry>) -> Result<Self> {
        let db = match &config.data_dir {
            Some(dir) => LocationDb::open(dir)?,
            None => {
                warn!("no data dir configured, location history will not survive a restart");
                LocationDb::open_in_memory()?
            }
        };
        let store = Arc::new(LocationStore::open(db, config.history_limit_cap)?);

        let index = Arc::new(LatestIndex::new());
        for fix in store.latest_of_each() {
            index.update(fix);
        }

        let hub = Arc::new(BroadcastHub::new(config.subscriber_buffer));
        let ingest = IngestService::new(registry, store.clone(), index.clone(), hub.clone());
        let queries =
            LocationQueries::new(store.clone(), index.clone(), config.default_history_limit);
        info!(
            "tracker ready: {} vehicles with a known position",
            index.len()
        );

        Ok(Tracker {
            config,
            store,
            index,
            hub,
            ingest,
            queries,
        })
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<LocationStore> {
        &self.store
    }

    pub fn index(&self) -> &Arc<LatestIndex> {
        &self.index
    }

    pub fn hub(&self) -> &Arc<BroadcastHub<LocationUpdate>> {
        &self.hub
    }

    pub fn ingest(&self, report: LocationReport) -> Result<Arc<LocationFix>, TrackingError> {
        self.ingest.ingest(report)
    }

    pub fn ingest_fix(&self, fix: NewFix) -> Result<Arc<LocationFix>, TrackingError> {
        self.ingest.ingest_fix(fix)
    }

    pub fn history(&self, vehicle_id: VehicleId, query: &HistoryQuery) -> Vec<Arc<LocationFix>> {
        self.queries.history(vehicle_id, query)
    }

    pub fn latest(&self, vehicle_id: VehicleId) -> Result<Arc<LocationFix>, TrackingError> {
        self.queries.latest(vehicle_id)
    }

    pub fn locations(&self, params: &LocationsParams) -> Vec<Arc<LocationFix>> {
        self.queries.locations(params)
    }

    pub fn geofence_check(
        &self,
        request: &GeofenceRequest,
    ) -> Result<GeofenceResult, TrackingError> {
        self.queries.geofence(request)
    }

    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }
}
