use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

pub type VehicleId = i64;

/// A GPS sample that passed validation but has not been sequenced by the
/// store yet.
#[derive(Clone, Debug, PartialEq)]
pub struct NewFix {
    pub vehicle_id: VehicleId,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub accuracy: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Sub-second digits kept on a stored timestamp. Matches the log's
/// `timestamp_ms` column so a replayed fix equals the one handed out.
pub const TIMESTAMP_PRECISION_DIGITS: u16 = 3;

impl NewFix {
    /// Turns the sample into a stored fix. The timestamp is truncated to
    /// milliseconds here, the only place a `LocationFix` is created.
    pub fn sequenced(self, ingestion_seq: i64) -> LocationFix {
        LocationFix {
            ingestion_seq,
            vehicle_id: self.vehicle_id,
            latitude: self.latitude,
            longitude: self.longitude,
            speed: self.speed,
            heading: self.heading,
            accuracy: self.accuracy,
            timestamp: self.timestamp.trunc_subsecs(TIMESTAMP_PRECISION_DIGITS),
        }
    }
}

/// One stored GPS sample. Immutable once the store hands it out.
///
/// `ingestion_seq` doubles as the public fix id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    #[serde(rename = "id")]
    pub ingestion_seq: i64,
    #[serde(rename = "bus_id")]
    pub vehicle_id: VehicleId,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub accuracy: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl LocationFix {
    /// Total order used everywhere a "newer" fix has to be picked: timestamp
    /// first, ingestion sequence to break ties.
    pub fn order_key(&self) -> (DateTime<Utc>, i64) {
        (self.timestamp, self.ingestion_seq)
    }

    pub fn is_newer_than(&self, other: &LocationFix) -> bool {
        self.order_key() > other.order_key()
    }
}
