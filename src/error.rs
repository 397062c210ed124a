use strum_macros::IntoStaticStr;
use thiserror::Error;

use crate::location_fix::VehicleId;

/// Every way a tracking operation can fail. Validation variants are always
/// raised before anything is appended, indexed or published.
#[derive(Debug, Error, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum TrackingError {
    #[error("{field} must be between -{bound} and {bound}, got {value}")]
    InvalidCoordinate {
        field: &'static str,
        bound: f64,
        value: f64,
    },

    #[error("unknown vehicle: {0}")]
    UnknownVehicle(VehicleId),

    #[error("no location data found for vehicle {0}")]
    NotFound(VehicleId),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Storage failed. Not retried internally.
    #[error("transient failure: {0}")]
    Transient(#[source] anyhow::Error),
}

impl TrackingError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedRequest(msg.into())
    }

    /// Stable snake_case name of the variant, sent to clients next to the
    /// human readable message.
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

pub fn check_latitude(value: f64) -> Result<f64, TrackingError> {
    check_range("latitude", 90.0, value)
}

pub fn check_longitude(value: f64) -> Result<f64, TrackingError> {
    check_range("longitude", 180.0, value)
}

fn check_range(field: &'static str, bound: f64, value: f64) -> Result<f64, TrackingError> {
    // NaN fails `contains` as well
    if (-bound..=bound).contains(&value) {
        Ok(value)
    } else {
        Err(TrackingError::InvalidCoordinate {
            field,
            bound,
            value,
        })
    }
}
