//! Read API routes against a running hub

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use guardia_uptime::api::router;
use guardia_uptime::hub::Hub;
use pretty_assertions::assert_eq;
use serde_json::Value;
use tower::ServiceExt;

use crate::helpers::{
    FakeTransport, RecordingNotifier, fake_services, paused_clock, parse_config, refused, settle,
};

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn running_hub() -> Hub {
    let transport = FakeTransport::new();
    transport.script("http://bad.test/", vec![refused()]);
    let config = parse_config(
        r#"{
            "title": "API Test",
            "alerts": { "retry_count": 1 },
            "storage": { "backend": "none" },
            "targets": [
                { "name": "good", "url": "http://good.test/", "category": "web" },
                { "name": "bad", "url": "http://bad.test/" }
            ]
        }"#,
    );
    let hub = Hub::start(
        &config,
        fake_services(transport, RecordingNotifier::new(), paused_clock()),
    )
    .await
    .unwrap();
    settle().await;
    hub
}

#[tokio::test(start_paused = true)]
async fn test_health_and_status() {
    let hub = running_hub().await;
    let app = router(hub.api_state(), false);

    let (status, body) = get(&app, "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["storage"].as_str().unwrap().contains("operational"));

    let (status, body) = get(&app, "/api/v1/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "API Test");
    assert_eq!(body["services"].as_array().unwrap().len(), 2);

    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_services_in_configuration_order() {
    let hub = running_hub().await;
    let app = router(hub.api_state(), false);

    let (status, body) = get(&app, "/api/v1/services").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["services"][0]["name"], "good");
    assert_eq!(body["services"][0]["status"], "up");
    assert_eq!(body["services"][0]["category"], "web");
    assert_eq!(body["services"][1]["name"], "bad");
    assert_eq!(body["services"][1]["status"], "down");
    assert!(
        body["services"][1]["error"]
            .as_str()
            .unwrap()
            .contains("connection refused")
    );

    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_service_history_endpoints() {
    let hub = running_hub().await;
    let app = router(hub.api_state(), false);

    let (status, body) = get(&app, "/api/v1/services/bad/checks?limit=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["checks"][0]["success"], false);

    let (status, body) = get(&app, "/api/v1/services/good/hourly?hours=3").await;
    assert_eq!(status, StatusCode::OK);
    let buckets = body["buckets"].as_array().unwrap();
    assert_eq!(buckets.len(), 3);
    assert!(buckets[0]["uptime_percent"].is_null());
    assert_eq!(buckets[2]["uptime_percent"], 100.0);

    let (status, body) = get(&app, "/api/v1/services/good/uptime?hours=24").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_checks"], 1);
    assert_eq!(body["uptime_percentage"], 100.0);

    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_unknown_service_and_bad_parameters() {
    let hub = running_hub().await;
    let app = router(hub.api_state(), false);

    let (status, body) = get(&app, "/api/v1/services/missing/checks").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("missing"));

    let (status, _) = get(&app, "/api/v1/services/good/hourly?hours=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_incidents_and_stats() {
    let hub = running_hub().await;
    let app = router(hub.api_state(), false);

    let (status, body) = get(&app, "/api/v1/incidents").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["open"], 1);
    assert_eq!(body["incidents"][0]["target"], "bad");

    let (status, body) = get(&app, "/api/v1/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["services"], 2);
    assert_eq!(body["open_incidents"], 1);
    assert_eq!(body["storage"]["total_checks"], 2);

    hub.shutdown().await;
}
