//! OpenAI chat completions integration tests
//!
//! - POST /v1/chat/completions, buffered and streaming
//! - resolution failures never reach the provider
//! - every relayed call is logged with its token usage

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use bytes::Bytes;
use chrono::Utc;
use futures::{stream, StreamExt};
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use gen_ai_proxy::{
    store::{CallType, ConnectionRecord, ModelKind, ProviderKind},
    CredentialVault,
};

use crate::common::{api_key_name, constants, GatewayTestHarness};
use crate::mocks::{MockOpenAi, OpenAiTestData};

fn chat_request(model: &str) -> Value {
    json!({
        "model": model,
        "messages": [{"role": "user", "content": "Hello"}]
    })
}

#[tokio::test]
async fn test_buffered_chat_relays_body_and_logs_usage() {
    let harness = GatewayTestHarness::new().await;
    let upstream = MockOpenAi::start().await;
    let route = harness.openai_chat_model("gpt-alias", &upstream.uri()).await;
    upstream
        .mock_chat_completion_requiring_key(
            constants::TEST_PROVIDER_KEY,
            OpenAiTestData::chat_response("Hi there", 12, 7),
        )
        .await;

    let request = chat_request("gpt-alias");
    let response = harness
        .server
        .post("/v1/chat/completions")
        .add_header(api_key_name(), harness.api_key_header())
        .json(&request)
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["choices"][0]["message"]["content"], "Hi there");
    assert_eq!(body["usage"]["total_tokens"], 19);

    let sent = upstream.last_request_body().await.expect("upstream was called");
    assert_eq!(sent["model"], "gpt-alias-upstream");
    assert_eq!(sent["stream"], false);
    assert_eq!(sent["messages"], request["messages"]);

    let logs = harness.wait_for_logs(1, Duration::from_secs(2)).await;
    assert_eq!(logs.len(), 1);
    let log = &logs[0];
    assert_eq!(log.user_id, harness.user_id);
    assert_eq!(log.model_id, route.model_id);
    assert_eq!(log.connection_id, route.connection_id);
    assert_eq!(log.call_type, CallType::Chat);
    assert_eq!(log.prompt_tokens, 12);
    assert_eq!(log.completion_tokens, 7);

    // The log keeps what the provider received, not the caller's body
    let logged_request: Value = serde_json::from_slice(&log.request_payload).unwrap();
    assert_eq!(logged_request, sent);
    assert_eq!(logged_request["model"], "gpt-alias-upstream");
    let logged_response: Value = serde_json::from_slice(&log.response_payload).unwrap();
    assert_eq!(logged_response["usage"]["prompt_tokens"], 12);
}

#[tokio::test]
async fn test_bearer_header_is_accepted_as_api_key() {
    let harness = GatewayTestHarness::new().await;
    let upstream = MockOpenAi::start().await;
    harness.openai_chat_model("gpt-alias", &upstream.uri()).await;
    upstream
        .mock_chat_completion(OpenAiTestData::chat_response("ok", 1, 1))
        .await;

    let response = harness
        .server
        .post("/v1/chat/completions")
        .add_header(
            header::AUTHORIZATION,
            format!("Bearer {}", harness.api_key).parse().unwrap(),
        )
        .json(&chat_request("gpt-alias"))
        .await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_streaming_chat_relays_frames_and_logs_final_usage() {
    let harness = GatewayTestHarness::new().await;
    let upstream = MockOpenAi::start().await;
    harness.openai_chat_model("gpt-alias", &upstream.uri()).await;
    upstream
        .mock_chat_completion_stream(&[
            OpenAiTestData::stream_chunk("Hel"),
            OpenAiTestData::stream_chunk("lo"),
            OpenAiTestData::stream_usage_chunk(9, 2),
        ])
        .await;

    let mut request = chat_request("gpt-alias");
    request["stream"] = json!(true);

    let response = harness
        .server
        .post("/v1/chat/completions")
        .add_header(api_key_name(), harness.api_key_header())
        .json(&request)
        .await;

    response.assert_status_ok();
    let content_type = response.headers().get(header::CONTENT_TYPE);
    assert_eq!(content_type.unwrap().to_str().unwrap(), "text/event-stream");
    let text = response.text();
    assert!(text.contains("\"Hel\""));
    assert!(text.ends_with("data: [DONE]\n\n"));

    let sent = upstream.last_request_body().await.unwrap();
    assert_eq!(sent["stream"], true);

    let logs = harness.wait_for_logs(1, Duration::from_secs(2)).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].prompt_tokens, 9);
    assert_eq!(logs[0].completion_tokens, 2);
    assert_eq!(logs[0].response_payload, text.as_bytes());
}

#[tokio::test]
async fn test_unknown_model_is_rejected_without_upstream_call() {
    let harness = GatewayTestHarness::new().await;
    let upstream = MockOpenAi::start().await;
    harness.openai_chat_model("gpt-alias", &upstream.uri()).await;

    let response = harness
        .server
        .post("/v1/chat/completions")
        .add_header(api_key_name(), harness.api_key_header())
        .json(&chat_request("does-not-exist"))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "MODEL_NOT_FOUND");

    assert!(upstream.received_requests().await.is_empty());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(harness.store.logs().await.is_empty());
}

#[tokio::test]
async fn test_models_of_other_users_are_invisible() {
    let harness = GatewayTestHarness::new().await;
    let upstream = MockOpenAi::start().await;

    let stranger = Uuid::new_v4();
    let provider_id = harness
        .add_provider(stranger, "theirs", ProviderKind::OpenAi, &upstream.uri())
        .await;
    let connection_id = harness
        .add_connection(stranger, provider_id, "theirs", "sk-theirs")
        .await;
    harness
        .add_model(stranger, connection_id, "gpt-alias", ModelKind::Chat, (0.0, 0.0))
        .await;

    let response = harness
        .server
        .post("/v1/chat/completions")
        .add_header(api_key_name(), harness.api_key_header())
        .json(&chat_request("gpt-alias"))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert!(upstream.received_requests().await.is_empty());
}

#[tokio::test]
async fn test_soft_deleted_model_is_not_found() {
    let harness = GatewayTestHarness::new().await;
    let upstream = MockOpenAi::start().await;
    let route = harness.openai_chat_model("gpt-alias", &upstream.uri()).await;
    harness.store.soft_delete_model(route.model_id).await;

    let response = harness
        .server
        .post("/v1/chat/completions")
        .add_header(api_key_name(), harness.api_key_header())
        .json(&chat_request("gpt-alias"))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_soft_deleted_connection_is_not_found() {
    let harness = GatewayTestHarness::new().await;
    let upstream = MockOpenAi::start().await;
    let route = harness.openai_chat_model("gpt-alias", &upstream.uri()).await;
    harness.store.soft_delete_connection(route.connection_id).await;

    let response = harness
        .server
        .post("/v1/chat/completions")
        .add_header(api_key_name(), harness.api_key_header())
        .json(&chat_request("gpt-alias"))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "CONNECTION_NOT_FOUND");
}

#[tokio::test]
async fn test_ollama_model_on_openai_endpoint_is_a_type_mismatch() {
    let harness = GatewayTestHarness::new().await;
    let upstream = MockOpenAi::start().await;
    harness.ollama_chat_model("llama-alias", &upstream.uri()).await;

    let response = harness
        .server
        .post("/v1/chat/completions")
        .add_header(api_key_name(), harness.api_key_header())
        .json(&chat_request("llama-alias"))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "PROVIDER_TYPE_MISMATCH");
    assert!(upstream.received_requests().await.is_empty());
}

#[tokio::test]
async fn test_tools_must_be_an_array() {
    let harness = GatewayTestHarness::new().await;
    let upstream = MockOpenAi::start().await;
    harness.openai_chat_model("gpt-alias", &upstream.uri()).await;

    let mut request = chat_request("gpt-alias");
    request["tools"] = json!({"type": "function"});

    let response = harness
        .server
        .post("/v1/chat/completions")
        .add_header(api_key_name(), harness.api_key_header())
        .json(&request)
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "TRANSLATION_FAILED");
    assert!(upstream.received_requests().await.is_empty());
}

#[tokio::test]
async fn test_tools_array_is_forwarded() {
    let harness = GatewayTestHarness::new().await;
    let upstream = MockOpenAi::start().await;
    harness.openai_chat_model("gpt-alias", &upstream.uri()).await;
    upstream
        .mock_chat_completion(OpenAiTestData::chat_response("ok", 1, 1))
        .await;

    let tools = json!([{"type": "function", "function": {"name": "lookup"}}]);
    let mut request = chat_request("gpt-alias");
    request["tools"] = tools.clone();

    harness
        .server
        .post("/v1/chat/completions")
        .add_header(api_key_name(), harness.api_key_header())
        .json(&request)
        .await
        .assert_status_ok();

    let sent = upstream.last_request_body().await.unwrap();
    assert_eq!(sent["tools"], tools);
}

#[tokio::test]
async fn test_malformed_body_is_a_bad_request() {
    let harness = GatewayTestHarness::new().await;

    let response = harness
        .server
        .post("/v1/chat/completions")
        .add_header(api_key_name(), harness.api_key_header())
        .json(&json!({"messages": []}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_credential_sealed_under_another_key_fails_before_upstream() {
    let harness = GatewayTestHarness::new().await;
    let upstream = MockOpenAi::start().await;

    let provider_id = harness
        .add_provider(harness.user_id, "foreign", ProviderKind::OpenAi, &upstream.uri())
        .await;
    let other_vault = CredentialVault::new(&[9u8; 32]).unwrap();
    let connection_id = Uuid::new_v4();
    harness
        .store
        .insert_connection(ConnectionRecord {
            id: connection_id,
            user_id: harness.user_id,
            provider_id: provider_id.to_string(),
            encrypted_api_key: other_vault.encrypt("sk-foreign").unwrap(),
            name: "foreign".to_string(),
            created_at: Utc::now(),
            deleted_at: None,
        })
        .await;
    harness
        .add_model(harness.user_id, connection_id, "gpt-alias", ModelKind::Chat, (0.0, 0.0))
        .await;

    let response = harness
        .server
        .post("/v1/chat/completions")
        .add_header(api_key_name(), harness.api_key_header())
        .json(&chat_request("gpt-alias"))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "DECRYPTION_FAILED");
    assert!(!response.text().contains("sk-foreign"));
    assert!(upstream.received_requests().await.is_empty());
}

#[tokio::test]
async fn test_non_json_upstream_error_is_relayed_and_logged_without_usage() {
    let harness = GatewayTestHarness::new().await;
    let upstream = MockOpenAi::start().await;
    harness.openai_chat_model("gpt-alias", &upstream.uri()).await;
    upstream
        .mock_chat_completion_error(503, "upstream overloaded")
        .await;

    let response = harness
        .server
        .post("/v1/chat/completions")
        .add_header(api_key_name(), harness.api_key_header())
        .json(&chat_request("gpt-alias"))
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.text(), "upstream overloaded");

    let logs = harness.wait_for_logs(1, Duration::from_secs(2)).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].prompt_tokens, 0);
    assert_eq!(logs[0].completion_tokens, 0);
    assert_eq!(logs[0].response_payload, b"upstream overloaded");
}

#[tokio::test]
async fn test_unreachable_provider_is_bad_gateway() {
    let harness = GatewayTestHarness::new().await;
    harness.openai_chat_model("gpt-alias", "http://127.0.0.1:1").await;

    let response = harness
        .server
        .post("/v1/chat/completions")
        .add_header(api_key_name(), harness.api_key_header())
        .json(&chat_request("gpt-alias"))
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "UPSTREAM_UNAVAILABLE");
}

/// Upstream that sends one SSE frame and then stalls forever
async fn start_stalling_upstream() -> String {
    use axum::{routing::post, Router};

    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            let frames = stream::once(async {
                Ok::<_, std::io::Error>(Bytes::from_static(b"data: A\n\n"))
            })
            .chain(stream::pending());
            axum::response::Response::builder()
                .header(header::CONTENT_TYPE, "text/event-stream")
                .body(Body::from_stream(frames))
                .unwrap()
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_client_disconnect_logs_forwarded_prefix() {
    let harness = GatewayTestHarness::new().await;
    let upstream_uri = start_stalling_upstream().await;
    harness.openai_chat_model("gpt-alias", &upstream_uri).await;

    let mut payload = chat_request("gpt-alias");
    payload["stream"] = json!(true);
    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("x-api-key", harness.api_key.as_str())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();

    let response = harness.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body();
    let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
    assert_eq!(&first[..], b"data: A\n\n");

    // Nothing else arrives; the caller gives up
    assert!(tokio::time::timeout(Duration::from_millis(100), body.frame())
        .await
        .is_err());
    drop(body);

    let logs = harness.wait_for_logs(1, Duration::from_secs(2)).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].response_payload, b"data: A\n\n");
    assert_eq!(logs[0].prompt_tokens, 0);
}
