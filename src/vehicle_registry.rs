use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::location_fix::VehicleId;

/// Display data used to enrich realtime events.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_number: Option<String>,
}

/// Read-only view of the fleet owned by the vehicle CRUD side. The tracking
/// core only asks whether a vehicle exists and, optionally, how to label it.
/// Lookups are expected to be local or cached; ingest calls `exists` inline.
pub trait VehicleRegistry: Send + Sync {
    fn exists(&self, vehicle_id: VehicleId) -> bool;

    fn metadata(&self, _vehicle_id: VehicleId) -> Option<VehicleMetadata> {
        None
    }
}

#[derive(Debug, Deserialize)]
struct VehicleRecord {
    id: VehicleId,
    #[serde(flatten)]
    metadata: VehicleMetadata,
}

#[derive(Default)]
pub struct StaticVehicleRegistry {
    vehicles: HashMap<VehicleId, VehicleMetadata>,
}

impl StaticVehicleRegistry {
    pub fn new() -> Self {
        Self {
            vehicles: HashMap::new(),
        }
    }

    pub fn with_vehicles(vehicle_ids: impl IntoIterator<Item = VehicleId>) -> Self {
        let mut registry = Self::new();
        for vehicle_id in vehicle_ids {
            registry.insert(vehicle_id, VehicleMetadata::default());
        }
        registry
    }

    /// Loads a JSON array of `{"id": .., "route": .., "driver_name": ..,
    /// "registration_number": ..}` objects.
    pub fn load_json(path: &Path) -> Result<Self> {
        let records: Vec<VehicleRecord> = serde_json::from_reader(BufReader::new(File::open(path)?))
            .map_err(|e| anyhow!("failed to parse vehicle file {:?}: {}", path, e))?;
        let mut registry = Self::new();
        for record in records {
            registry.insert(record.id, record.metadata);
        }
        info!("loaded {} vehicles from {:?}", registry.len(), path);
        Ok(registry)
    }

    pub fn insert(&mut self, vehicle_id: VehicleId, metadata: VehicleMetadata) {
        self.vehicles.insert(vehicle_id, metadata);
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}

impl VehicleRegistry for StaticVehicleRegistry {
    fn exists(&self, vehicle_id: VehicleId) -> bool {
        self.vehicles.contains_key(&vehicle_id)
    }

    fn metadata(&self, vehicle_id: VehicleId) -> Option<VehicleMetadata> {
        self.vehicles
            .get(&vehicle_id)
            .filter(|metadata| **metadata != VehicleMetadata::default())
            .cloned()
    }
}
