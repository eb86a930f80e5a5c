use std::sync::Arc;

use actix_web::{App, http::StatusCode, test, web};
use anomaly_core::{Anomaly, ViewportBounds};
use anomaly_server::{ServerState, configure_routes, cors_headers};
use anomaly_store::{AnomalyStore, BoundingBoxQueryService, MemoryStore, StoreError};
use serde_json::{Value, json};

struct UnreachableStore;

impl AnomalyStore for UnreachableStore {
    fn find_within(&self, _bounds: &ViewportBounds) -> Result<Vec<Anomaly>, StoreError> {
        Err(StoreError::Unavailable {
            reason: "cluster0 timed out".into(),
        })
    }

    fn document_count(&self) -> usize {
        0
    }
}

fn chicago_state() -> web::Data<ServerState> {
    let store = MemoryStore::with_default_grid(vec![
        Anomaly::new(-87.68, 41.86, "S Western Ave", 5).with_id("a1"),
        Anomaly::new(-87.65, 41.87, "W Roosevelt Rd", 12).with_id("a2"),
        Anomaly::new(-87.62, 41.89, "N Michigan Ave", 25).with_id("a3"),
        Anomaly::new(-87.90, 41.97, "O'Hare Access Rd", 40).with_id("a4"),
    ]);
    web::Data::new(ServerState::new(
        BoundingBoxQueryService::new(Arc::new(store)),
        None,
    ))
}

macro_rules! service {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state)
                .wrap(cors_headers())
                .configure(configure_routes),
        )
        .await
    };
}

#[actix_web::test]
async fn viewport_query_returns_geojson_features() {
    let app = service!(chicago_state());
    let req = test::TestRequest::get()
        .uri("/api/anomalies?minLng=-87.700000&minLat=41.850000&maxLng=-87.600000&maxLat=41.900000")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );

    let body: Value = test::read_body_json(resp).await;
    let features = body.as_array().expect("array body");
    assert_eq!(features.len(), 3);
    for feature in features {
        assert_eq!(feature["type"], "Feature");
        assert_eq!(feature["geometry"]["type"], "Point");
        let lng = feature["geometry"]["coordinates"][0].as_f64().unwrap();
        let lat = feature["geometry"]["coordinates"][1].as_f64().unwrap();
        assert!((-87.7..=-87.6).contains(&lng), "longitude {lng} out of box");
        assert!((41.85..=41.9).contains(&lat), "latitude {lat} out of box");
        assert!(feature["properties"]["road_name"].is_string());
    }
}

#[actix_web::test]
async fn missing_max_values_is_bad_request() {
    let app = service!(chicago_state());
    let req = test::TestRequest::get()
        .uri("/api/anomalies?minLng=1&minLat=2")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "error": "Missing bounding box parameters" }));
}

#[actix_web::test]
async fn malformed_value_is_bad_request() {
    let app = service!(chicago_state());
    let req = test::TestRequest::get()
        .uri("/api/anomalies?minLng=abc&minLat=2&maxLng=3&maxLat=4")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("minLng"));
}

#[actix_web::test]
async fn undecodable_query_string_gets_json_error() {
    let app = service!(chicago_state());
    let req = test::TestRequest::get()
        .uri("/api/anomalies?minLng=1&minLng=2&minLat=2&maxLng=3&maxLat=4")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    let error = body["error"].as_str().expect("error string");
    assert!(error.contains("minLng"), "unexpected error {error:?}");
    assert!(body.get("details").is_none());
}

#[actix_web::test]
async fn huge_finite_box_returns_every_feature() {
    let app = service!(chicago_state());
    let req = test::TestRequest::get()
        .uri("/api/anomalies?minLng=-1e20&minLat=-1e20&maxLng=1e20&maxLat=1e20")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body.as_array().map(Vec::len), Some(4));
}

#[actix_web::test]
async fn inverted_longitudes_return_empty_array() {
    let app = service!(chicago_state());
    let req = test::TestRequest::get()
        .uri("/api/anomalies?minLng=-87.6&minLat=41.85&maxLng=-87.7&maxLat=41.9")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!([]));
}

#[actix_web::test]
async fn store_failure_surfaces_as_server_error() {
    let state = web::Data::new(ServerState::new(
        BoundingBoxQueryService::new(Arc::new(UnreachableStore)),
        None,
    ));
    let app = service!(state);
    let req = test::TestRequest::get()
        .uri("/api/anomalies?minLng=0&minLat=0&maxLng=1&maxLat=1")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Server error");
    assert!(body["details"].as_str().unwrap().contains("cluster0 timed out"));
}

#[actix_web::test]
async fn health_reports_document_count() {
    let app = service!(chicago_state());
    let req = test::TestRequest::get().uri("/healthz").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({ "status": "ok", "anomalies": 4 }));
}

#[actix_web::test]
async fn metrics_without_recorder_is_no_content() {
    let app = service!(chicago_state());
    let req = test::TestRequest::get().uri("/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}
