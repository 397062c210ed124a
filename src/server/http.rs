use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use actix_web_actors::ws;
use serde_json::json;
use std::sync::Arc;

use crate::error::TrackingError;
use crate::geofence::GeofenceResponse;
use crate::ingest::LocationReport;
use crate::location_fix::VehicleId;
use crate::query::{GeofenceRequest, HistoryParams, HistoryQuery, LocationsParams};
use crate::server::ws_session::TrackingSession;
use crate::tracker::Tracker;

pub struct AppState {
    pub tracker: Arc<Tracker>,
}

impl ResponseError for TrackingError {
    fn status_code(&self) -> StatusCode {
        match self {
            TrackingError::InvalidCoordinate { .. } | TrackingError::MalformedRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            TrackingError::UnknownVehicle(_) | TrackingError::NotFound(_) => StatusCode::NOT_FOUND,
            TrackingError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "error": self.to_string(),
            "kind": self.kind(),
        }))
    }
}

/// Registers every tracking route on `cfg`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/locations", web::post().to(post_location))
        .route("/locations", web::get().to(get_locations))
        .route("/locations/{vehicle_id}", web::get().to(get_history))
        .route("/geofence-check", web::post().to(post_geofence_check))
        .route("/ws", web::get().to(ws_index));
}

async fn post_location(
    body: web::Bytes,
    data: web::Data<AppState>,
) -> Result<HttpResponse, TrackingError> {
    let report = LocationReport::parse(&body)?;
    let tracker = data.tracker.clone();
    // sqlite append is blocking
    let fix = web::block(move || tracker.ingest(report))
        .await
        .map_err(|e| TrackingError::Transient(anyhow!("ingest worker failed: {}", e)))??;
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "id": fix.ingestion_seq,
        "vehicle_id": fix.vehicle_id,
        "message": "Location updated successfully",
    })))
}

async fn get_locations(
    params: web::Query<LocationsParams>,
    data: web::Data<AppState>,
) -> HttpResponse {
    let fixes = data.tracker.locations(&params);
    HttpResponse::Ok().json(json!({ "success": true, "data": fixes }))
}

async fn get_history(
    path: web::Path<VehicleId>,
    params: web::Query<HistoryParams>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, TrackingError> {
    let vehicle_id = path.into_inner();
    let query = HistoryQuery::try_from(params.into_inner())?;
    let fixes = data.tracker.history(vehicle_id, &query);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": fixes })))
}

async fn post_geofence_check(
    body: web::Bytes,
    data: web::Data<AppState>,
) -> Result<HttpResponse, TrackingError> {
    let request = GeofenceRequest::parse(&body)?;
    let result = data.tracker.geofence_check(&request)?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": GeofenceResponse::from(&result),
    })))
}

async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    ws::start(
        TrackingSession::new(data.tracker.hub().clone()),
        &req,
        stream,
    )
}
