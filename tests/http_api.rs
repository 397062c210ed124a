pub mod test_utils;
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use bustrack_core::server::http::{configure, AppState};
use serde_json::{json, Value};
use test_utils::*;

macro_rules! app {
    ($tracker:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(AppState {
                    tracker: $tracker.clone(),
                }))
                .configure(configure),
        )
        .await
    };
}

#[actix_web::test]
async fn rest_end_to_end() {
    let tracker = in_memory_tracker(1);
    let app = app!(tracker);

    for i in 0..10 {
        let req = test::TestRequest::post()
            .uri("/locations")
            .set_json(json!({
                "vehicle_id": 1,
                "latitude": CENTER_LAT + 0.0001 * i as f64,
                "longitude": CENTER_LNG,
                "speed": 20.5,
                "timestamp": format!("2024-05-01T08:00:{:02}", i),
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["id"], i + 1);
        assert_eq!(body["vehicle_id"], 1);
    }

    let req = test::TestRequest::get()
        .uri("/locations/1?limit=3&start_time=2024-05-01T08:00:00Z")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let history = body["data"].as_array().unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0]["timestamp"], "2024-05-01T08:00:09Z");
    assert_eq!(history[2]["timestamp"], "2024-05-01T08:00:07Z");
    assert_eq!(history[0]["bus_id"], 1);

    let req = test::TestRequest::get().uri("/locations").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["id"], 10);

    let req = test::TestRequest::get()
        .uri("/locations?active_only=false&bus_id=1")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 10);

    let req = test::TestRequest::post()
        .uri("/geofence-check")
        .set_json(json!({
            "vehicle_id": 1,
            "center_lat": CENTER_LAT,
            "center_lng": CENTER_LNG,
            "radius_meters": 150.0,
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["is_inside"], true);
    assert_eq!(body["data"]["distance_from_center"], 100.08);
    assert_eq!(body["data"]["radius_meters"], 150.0);
    assert_eq!(
        body["data"]["current_location"]["timestamp"],
        "2024-05-01T08:00:09Z"
    );
}

#[actix_web::test]
async fn rejected_ingest_status_codes() {
    let tracker = in_memory_tracker(1);
    let app = app!(tracker);

    let cases = [
        (json!({"vehicle_id": 1, "latitude": 95.0, "longitude": 0.0}), StatusCode::BAD_REQUEST, "invalid_coordinate"),
        (json!({"vehicle_id": 1, "latitude": 0.0, "longitude": -200.0}), StatusCode::BAD_REQUEST, "invalid_coordinate"),
        (json!({"vehicle_id": 1, "latitude": 0.0}), StatusCode::BAD_REQUEST, "malformed_request"),
        (json!({"vehicle_id": 1, "latitude": 0.0, "longitude": 0.0, "timestamp": "soon"}), StatusCode::BAD_REQUEST, "malformed_request"),
        (json!({"vehicle_id": 2, "latitude": 0.0, "longitude": 0.0}), StatusCode::NOT_FOUND, "unknown_vehicle"),
    ];
    for (payload, status, kind) in cases {
        let req = test::TestRequest::post()
            .uri("/locations")
            .set_json(&payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), status, "{payload}");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["kind"], kind);
    }

    let req = test::TestRequest::post()
        .uri("/locations")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );

    assert_eq!(tracker.store().vehicle_count(), 0);
}

#[actix_web::test]
async fn missing_positions() {
    let tracker = in_memory_tracker(2);
    let app = app!(tracker);

    // no fix yet: the list is empty, not an error
    let req = test::TestRequest::get().uri("/locations?bus_id=2").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"], json!([]));

    let req = test::TestRequest::get().uri("/locations/2").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"], json!([]));

    let req = test::TestRequest::post()
        .uri("/geofence-check")
        .set_json(json!({"bus_id": 2, "center_lat": 0.0, "center_lng": 0.0, "radius_meters": 10.0}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["kind"], "not_found");

    let req = test::TestRequest::post()
        .uri("/geofence-check")
        .set_json(json!({"bus_id": 2, "center_lat": 0.0, "center_lng": 0.0, "radius_meters": -1.0}))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[actix_web::test]
async fn second_fix_replaces_the_first() {
    let tracker = in_memory_tracker(5);
    let app = app!(tracker);

    let post = |lat: f64, lng: f64, time: &str| {
        test::TestRequest::post()
            .uri("/locations")
            .set_json(json!({"vehicle_id": 5, "latitude": lat, "longitude": lng, "timestamp": time}))
            .to_request()
    };

    let resp = test::call_service(&app, post(12.9716, 77.5946, "2024-05-01T00:01:40Z")).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::get().uri("/locations/5?limit=1").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["latitude"], 12.9716);

    let req = test::TestRequest::post()
        .uri("/geofence-check")
        .set_json(json!({"vehicle_id": 5, "center_lat": 12.9716, "center_lng": 77.5946, "radius_meters": 10}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["is_inside"], true);
    assert_eq!(body["data"]["distance_from_center"], 0.0);

    let resp = test::call_service(&app, post(12.9750, 77.6000, "2024-05-01T00:03:20Z")).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::get()
        .uri("/locations?active_only=true&bus_id=5")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["latitude"], 12.975);

    let req = test::TestRequest::get().uri("/locations/5?limit=2").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let history = body["data"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["timestamp"], "2024-05-01T00:03:20Z");
    assert_eq!(history[1]["timestamp"], "2024-05-01T00:01:40Z");
}
