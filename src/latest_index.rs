use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::error::TrackingError;
use crate::location_fix::{LocationFix, VehicleId};

/// Vehicle -> most recent fix.
///
/// `DashMap` shards by key, so ingests for different vehicles only contend
/// when they hash to the same shard and never on a map-wide lock.
#[derive(Default)]
pub struct LatestIndex {
    entries: DashMap<VehicleId, Arc<LocationFix>>,
}

impl LatestIndex {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Replaces the indexed fix only when `fix` orders after it by
    /// `(timestamp, ingestion_seq)`, so a late write can never roll the index
    /// back. Returns whether the index changed.
    pub fn update(&self, fix: Arc<LocationFix>) -> bool {
        match self.entries.entry(fix.vehicle_id) {
            Entry::Vacant(entry) => {
                entry.insert(fix);
                true
            }
            Entry::Occupied(mut entry) => {
                if fix.is_newer_than(entry.get()) {
                    entry.insert(fix);
                    true
                } else {
                    debug!(
                        "[latest_index] keeping fix seq={} for vehicle {}, incoming seq={} is older",
                        entry.get().ingestion_seq,
                        fix.vehicle_id,
                        fix.ingestion_seq
                    );
                    false
                }
            }
        }
    }

    pub fn get(&self, vehicle_id: VehicleId) -> Result<Arc<LocationFix>, TrackingError> {
        self.entries
            .get(&vehicle_id)
            .map(|entry| entry.value().clone())
            .ok_or(TrackingError::NotFound(vehicle_id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location_fix::NewFix;
    use chrono::{TimeZone, Utc};

    fn fix(seq: i64, ts: i64) -> Arc<LocationFix> {
        Arc::new(
            NewFix {
                vehicle_id: 3,
                latitude: 1.0,
                longitude: 2.0,
                speed: None,
                heading: None,
                accuracy: None,
                timestamp: Utc.timestamp_opt(ts, 0).unwrap(),
            }
            .sequenced(seq),
        )
    }

    #[test]
    fn missing_vehicle_is_not_found() {
        let index = LatestIndex::new();
        assert!(matches!(index.get(3), Err(TrackingError::NotFound(3))));
    }

    #[test]
    fn tie_on_timestamp_goes_to_higher_seq() {
        let index = LatestIndex::new();
        assert!(index.update(fix(1, 100)));
        assert!(index.update(fix(2, 100)));
        assert!(!index.update(fix(1, 100)));
        assert_eq!(index.get(3).unwrap().ingestion_seq, 2);
    }
}
