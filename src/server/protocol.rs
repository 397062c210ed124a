use serde::{Deserialize, Serialize};

use crate::broadcast_hub::{BroadcastHub, SessionId, Topic};
use crate::ingest::LocationUpdate;
use crate::location_fix::VehicleId;

/// Messages a realtime client may send, e.g.
/// `{"event": "join_vehicle", "data": {"bus_id": 3}}`.
#[derive(Debug, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinTracking,
    LeaveTracking,
    JoinVehicle { bus_id: VehicleId },
    LeaveVehicle { bus_id: VehicleId },
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage<'a> {
    LocationUpdate(&'a LocationUpdate),
    TrackingJoined,
    TrackingLeft,
    VehicleJoined { bus_id: VehicleId },
    VehicleLeft { bus_id: VehicleId },
    Error { message: String },
}

impl ServerMessage<'_> {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Applies one client message to the hub and returns the acknowledgement.
/// Joining twice or leaving a topic the session is not in still acks.
pub fn handle<'a>(
    hub: &BroadcastHub<LocationUpdate>,
    session_id: SessionId,
    message: ClientMessage,
) -> ServerMessage<'a> {
    match message {
        ClientMessage::JoinTracking => {
            hub.join(session_id, Topic::Tracking);
            ServerMessage::TrackingJoined
        }
        ClientMessage::LeaveTracking => {
            hub.leave(session_id, Topic::Tracking);
            ServerMessage::TrackingLeft
        }
        ClientMessage::JoinVehicle { bus_id } => {
            hub.join(session_id, Topic::Vehicle(bus_id));
            ServerMessage::VehicleJoined { bus_id }
        }
        ClientMessage::LeaveVehicle { bus_id } => {
            hub.leave(session_id, Topic::Vehicle(bus_id));
            ServerMessage::VehicleLeft { bus_id }
        }
    }
}

pub fn handle_text<'a>(
    hub: &BroadcastHub<LocationUpdate>,
    session_id: SessionId,
    text: &str,
) -> ServerMessage<'a> {
    match ClientMessage::parse(text) {
        Ok(message) => handle(hub, session_id, message),
        Err(e) => {
            debug!("[ws] session {} sent an unreadable message: {}", session_id, e);
            ServerMessage::Error {
                message: format!("unrecognized message: {e}"),
            }
        }
    }
}
