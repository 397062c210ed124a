#![allow(clippy::new_without_default)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

pub mod broadcast_hub;
pub mod config;
pub mod error;
pub mod geofence;
pub mod ingest;
pub mod latest_index;
pub mod location_db;
pub mod location_fix;
pub mod location_store;
pub mod logs;
pub mod query;
pub mod server;
pub mod tracker;
pub mod vehicle_registry;

pub use error::TrackingError;
pub use location_fix::{LocationFix, VehicleId};
pub use tracker::Tracker;
