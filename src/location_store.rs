use anyhow::Result;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use itertools::Itertools;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::location_db::LocationDb;
use crate::location_fix::{LocationFix, NewFix, VehicleId};

/// All fixes of one vehicle, ascending by `(timestamp, ingestion_seq)`.
#[derive(Default)]
struct Partition {
    fixes: Vec<Arc<LocationFix>>,
}

impl Partition {
    fn insert(&mut self, fix: Arc<LocationFix>) {
        // almost always lands at the end; out-of-order timestamps are rare
        let key = fix.order_key();
        let pos = self.fixes.partition_point(|f| f.order_key() <= key);
        self.fixes.insert(pos, fix);
    }

    fn latest(&self) -> Option<&Arc<LocationFix>> {
        self.fixes.last()
    }
}

/// `writer` serializes appends for the vehicle and is held across the log
/// write; `fixes` is only write-locked for the in-memory insert.
#[derive(Default)]
struct VehiclePartition {
    writer: Mutex<()>,
    fixes: RwLock<Partition>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }
}

/// Append-only per-vehicle log of fixes.
///
/// Each vehicle has a single-writer sequencer: the sequence number is taken,
/// logged and inserted while it is held, so two fixes of the same vehicle can
/// never get ambiguous `ingestion_seq` ordering. Readers only wait for the
/// in-memory insert, never for the log write. Fixes of different vehicles
/// only share the sequence counter and the log connection.
pub struct LocationStore {
    db: Mutex<LocationDb>,
    partitions: DashMap<VehicleId, Arc<VehiclePartition>>,
    next_seq: AtomicI64,
    history_limit_cap: usize,
}

impl LocationStore {
    /// Opens the store over `db`, replaying every logged fix.
    pub fn open(db: LocationDb, history_limit_cap: usize) -> Result<Self> {
        let fixes = db.load_all()?;
        let next_seq = db.max_seq()?.unwrap_or(0) + 1;
        let partitions: DashMap<VehicleId, Arc<VehiclePartition>> = DashMap::new();
        let num_of_fixes = fixes.len();
        for fix in fixes {
            partitions
                .entry(fix.vehicle_id)
                .or_default()
                .fixes
                .write()
                .insert(Arc::new(fix));
        }
        info!(
            "location store opened: replayed {} fixes for {} vehicles, next_seq={}",
            num_of_fixes,
            partitions.len(),
            next_seq
        );
        Ok(LocationStore {
            db: Mutex::new(db),
            partitions,
            next_seq: AtomicI64::new(next_seq),
            history_limit_cap,
        })
    }

    pub fn history_limit_cap(&self) -> usize {
        self.history_limit_cap
    }

    fn partition(&self, vehicle_id: VehicleId) -> Arc<VehiclePartition> {
        self.partitions.entry(vehicle_id).or_default().value().clone()
    }

    pub fn append(&self, fix: NewFix) -> Result<Arc<LocationFix>> {
        self.append_then(fix, |_| ()).map(|(fix, ())| fix)
    }

    /// Appends `fix` and runs `f` on the stored fix before the vehicle's
    /// sequencer is released. Anything `f` does is therefore ordered the same
    /// way as the vehicle's ingestion sequence. The fix is already visible to
    /// readers while `f` runs. `f` must not append for the same vehicle.
    pub fn append_then<F, O>(&self, fix: NewFix, f: F) -> Result<(Arc<LocationFix>, O)>
    where
        F: FnOnce(&Arc<LocationFix>) -> O,
    {
        let partition = self.partition(fix.vehicle_id);
        let _writer = partition.writer.lock();

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let fix = Arc::new(fix.sequenced(seq));
        if let Err(e) = self.db.lock().append(&fix) {
            error!(
                "[location_store] failed to log fix for vehicle {}: {}",
                fix.vehicle_id, e
            );
            return Err(e);
        }
        partition.fixes.write().insert(fix.clone());

        let output = f(&fix);
        Ok((fix, output))
    }

    /// Newest first. `limit` is clamped to the server cap.
    pub fn history(
        &self,
        vehicle_id: VehicleId,
        range: TimeRange,
        limit: usize,
    ) -> Vec<Arc<LocationFix>> {
        let limit = limit.min(self.history_limit_cap);
        let partition = match self.partitions.get(&vehicle_id) {
            None => return Vec::new(),
            Some(partition) => partition.value().clone(),
        };
        let partition = partition.fixes.read();
        partition
            .fixes
            .iter()
            .rev()
            .skip_while(|f| range.end.is_some_and(|end| f.timestamp > end))
            .take_while(|f| range.start.map_or(true, |start| f.timestamp >= start))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn latest(&self, vehicle_id: VehicleId) -> Option<Arc<LocationFix>> {
        let partition = self.partitions.get(&vehicle_id)?.value().clone();
        let partition = partition.fixes.read();
        partition.latest().cloned()
    }

    /// One fix per vehicle that has at least one, ordered by vehicle id.
    pub fn latest_of_each(&self) -> Vec<Arc<LocationFix>> {
        self.snapshot_partitions()
            .into_iter()
            .filter_map(|(_, partition)| partition.fixes.read().latest().cloned())
            .collect()
    }

    /// Fixes across every vehicle, newest first, clamped to the server cap.
    pub fn all_fixes(&self, limit: usize) -> Vec<Arc<LocationFix>> {
        let limit = limit.min(self.history_limit_cap);
        let partitions = self.snapshot_partitions();
        let guards = partitions
            .iter()
            .map(|(_, partition)| partition.fixes.read())
            .collect::<Vec<_>>();
        guards
            .iter()
            .map(|guard| guard.fixes.iter().rev())
            .kmerge_by(|a, b| a.order_key() > b.order_key())
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn vehicle_count(&self) -> usize {
        self.partitions.len()
    }

    // Clone the handles out first so no map shard is held while waiting on a
    // partition lock.
    fn snapshot_partitions(&self) -> Vec<(VehicleId, Arc<VehiclePartition>)> {
        self.partitions
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .sorted_by_key(|(vehicle_id, _)| *vehicle_id)
            .collect()
    }

    pub fn flush(&self) -> Result<()> {
        debug!("[location_store] flushing");
        self.db.lock().flush()
    }
}
