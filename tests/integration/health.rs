//! Health endpoint integration tests
//!
//! - GET /ping
//! - GET /health - store check and log queue stats
//! - GET /health/ready, /health/live - probes
//! - GET /openapi.json

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::Value;

use crate::common::GatewayTestHarness;

#[tokio::test]
async fn test_ping() {
    let harness = GatewayTestHarness::new().await;

    let response = harness.server.get("/ping").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["message"], "pong");
}

#[tokio::test]
async fn test_health_reports_store_and_stats() {
    let harness = GatewayTestHarness::new().await;

    let response = harness.server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["store"]["status"], "healthy");
    assert_eq!(body["stats"]["dropped_logs"], 0);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_health_degrades_when_store_is_down() {
    let harness = GatewayTestHarness::new().await;
    harness.store.fail_catalog(true);

    let response = harness.server.get("/health").await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["status"], "unhealthy");
    assert!(body["checks"]["store"]["error"].is_string());

    harness
        .server
        .get("/health/ready")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);

    // Liveness does not depend on the store
    harness.server.get("/health/live").await.assert_status_ok();
}

#[tokio::test]
async fn test_probes_when_healthy() {
    let harness = GatewayTestHarness::new().await;

    let ready: Value = harness.server.get("/health/ready").await.json();
    assert_eq!(ready["status"], "healthy");

    let live: Value = harness.server.get("/health/live").await.json();
    assert_eq!(live["status"], "healthy");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let harness = GatewayTestHarness::new().await;

    let response = harness.server.get("/openapi.json").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert!(body["paths"]["/v1/chat/completions"].is_object());
    assert!(body["paths"]["/api/conversation_logs"].is_object());
}
