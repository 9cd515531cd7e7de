//! Authentication integration tests
//!
//! Proxy routes take API keys; the log API takes bearer tokens. Neither
//! credential opens the other's routes.

use std::time::{Duration, Instant};

use axum::http::{header, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use gen_ai_proxy::BearerTokens;

use crate::common::{api_key_name, constants, GatewayTestHarness};
use crate::mocks::{MockOpenAi, OpenAiTestData};

fn chat_request() -> Value {
    json!({"model": "gpt-alias", "messages": [{"role": "user", "content": "hi"}]})
}

#[tokio::test]
async fn test_missing_api_key_is_unauthenticated() {
    let harness = GatewayTestHarness::new().await;

    let response = harness
        .server
        .post("/v1/chat/completions")
        .json(&chat_request())
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_unknown_api_key_never_reaches_upstream() {
    let harness = GatewayTestHarness::new().await;
    let upstream = MockOpenAi::start().await;
    harness.openai_chat_model("gpt-alias", &upstream.uri()).await;

    for path in ["/v1/chat/completions", "/api/chat", "/v1/embeddings"] {
        let response = harness
            .server
            .post(path)
            .add_header(api_key_name(), "not-a-real-key".parse().unwrap())
            .json(&chat_request())
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    assert!(upstream.received_requests().await.is_empty());
}

#[tokio::test]
async fn test_api_key_does_not_open_log_api() {
    let harness = GatewayTestHarness::new().await;

    let response = harness
        .server
        .get("/api/conversation_logs")
        .add_header(
            header::AUTHORIZATION,
            format!("Bearer {}", harness.api_key).parse().unwrap(),
        )
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_bearer_token_is_unauthenticated() {
    let harness = GatewayTestHarness::new().await;

    let response = harness.server.get("/api/conversation_logs").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_bearer_token_is_rejected() {
    let harness = GatewayTestHarness::new().await;
    let stale = BearerTokens::new(constants::TEST_JWT_SECRET, -5);
    let token = stale.issue(harness.user_id).unwrap();

    let response = harness
        .server
        .get("/api/conversation_logs")
        .add_header(header::AUTHORIZATION, format!("Bearer {}", token).parse().unwrap())
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bearer_token_signed_with_other_secret_is_rejected() {
    let harness = GatewayTestHarness::new().await;
    let forged = BearerTokens::new("some-other-secret", 60)
        .issue(harness.user_id)
        .unwrap();

    let response = harness
        .server
        .get("/api/conversation_logs")
        .add_header(header::AUTHORIZATION, format!("Bearer {}", forged).parse().unwrap())
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_valid_bearer_token_opens_log_api() {
    let harness = GatewayTestHarness::new().await;

    let response = harness
        .server
        .get("/api/conversation_logs")
        .add_header(header::AUTHORIZATION, harness.bearer_header())
        .await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_catalog_outage_on_proxy_call_is_a_store_error() {
    let harness = GatewayTestHarness::new().await;
    let upstream = MockOpenAi::start().await;
    harness.openai_chat_model("gpt-alias", &upstream.uri()).await;
    harness.store.fail_catalog(true);

    let response = harness
        .server
        .post("/v1/chat/completions")
        .add_header(api_key_name(), harness.api_key_header())
        .json(&chat_request())
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "STORE_ERROR");
    assert!(upstream.received_requests().await.is_empty());
}

#[tokio::test]
async fn test_successful_call_records_key_last_use() {
    let harness = GatewayTestHarness::new().await;
    let upstream = MockOpenAi::start().await;
    harness.openai_chat_model("gpt-alias", &upstream.uri()).await;
    upstream
        .mock_chat_completion(OpenAiTestData::chat_response("ok", 1, 1))
        .await;
    let before = harness.store.api_key(harness.api_key_id).await.unwrap();
    assert!(before.last_used_at.is_none());

    harness
        .server
        .post("/v1/chat/completions")
        .add_header(api_key_name(), harness.api_key_header())
        .json(&chat_request())
        .await
        .assert_status_ok();

    // The touch runs detached from the request
    let start = Instant::now();
    let mut last_used = None;
    while last_used.is_none() && start.elapsed() < Duration::from_secs(2) {
        last_used = harness
            .store
            .api_key(harness.api_key_id)
            .await
            .and_then(|k| k.last_used_at);
        if last_used.is_none() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
    assert!(last_used.is_some());
}

#[tokio::test]
async fn test_failed_last_use_touch_does_not_fail_the_call() {
    let harness = GatewayTestHarness::new().await;
    let upstream = MockOpenAi::start().await;
    harness.openai_chat_model("gpt-alias", &upstream.uri()).await;
    upstream
        .mock_chat_completion(OpenAiTestData::chat_response("still here", 1, 1))
        .await;
    harness.store.fail_touch(true);

    let response = harness
        .server
        .post("/v1/chat/completions")
        .add_header(api_key_name(), harness.api_key_header())
        .json(&chat_request())
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["choices"][0]["message"]["content"], "still here");

    tokio::time::sleep(Duration::from_millis(100)).await;
    let key = harness.store.api_key(harness.api_key_id).await.unwrap();
    assert!(key.last_used_at.is_none());
}
