//! Usage metrics integration tests
//!
//! GET /metrics recomputes usage counters from the stored logs on every scrape.

use std::time::Duration;

use axum::http::{header, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::{api_key_name, GatewayTestHarness};
use crate::mocks::{MockOpenAi, OpenAiTestData};

/// Value of the first sample of `metric`
fn sample(text: &str, metric: &str) -> Option<f64> {
    text.lines()
        .find(|l| l.starts_with(&format!("{}{{", metric)))
        .and_then(|l| l.rsplit(' ').next())
        .and_then(|v| v.parse().ok())
}

#[tokio::test]
async fn test_usage_counters_follow_logged_calls() {
    let harness = GatewayTestHarness::new().await;
    let upstream = MockOpenAi::start().await;
    let route = harness.openai_chat_model("gpt-alias", &upstream.uri()).await;
    upstream
        .mock_chat_completion(OpenAiTestData::chat_response("ok", 100, 50))
        .await;

    for _ in 0..2 {
        harness
            .server
            .post("/v1/chat/completions")
            .add_header(api_key_name(), harness.api_key_header())
            .json(&json!({"model": "gpt-alias", "messages": [{"role": "user", "content": "hi"}]}))
            .await
            .assert_status_ok();
    }
    harness.wait_for_logs(2, Duration::from_secs(2)).await;

    let response = harness.server.get("/metrics").await;
    response.assert_status_ok();
    let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
    assert!(content_type.to_str().unwrap().starts_with("text/plain"));

    let text = response.text();
    assert!(text.contains("# TYPE gen_ai_proxy_total_tokens counter"));
    assert!(text.contains(&format!("model_id=\"{}\"", route.model_id)));
    assert!(text.contains("model_name=\"gpt-alias\""));
    assert!(text.contains("provider_name=\"gpt-alias provider\""));

    assert_eq!(sample(&text, "gen_ai_proxy_total_tokens"), Some(300.0));
    assert_eq!(sample(&text, "gen_ai_proxy_total_input_tokens_by_model"), Some(200.0));
    assert_eq!(sample(&text, "gen_ai_proxy_total_output_tokens_by_model"), Some(100.0));
    // 200 * 0.001 + 100 * 0.002
    let price = sample(&text, "gen_ai_proxy_total_price").unwrap();
    assert!((price - 0.4).abs() < 1e-9);
}

#[tokio::test]
async fn test_price_uses_current_model_prices() {
    let harness = GatewayTestHarness::new().await;
    let upstream = MockOpenAi::start().await;
    let route = harness.openai_chat_model("gpt-alias", &upstream.uri()).await;
    upstream
        .mock_chat_completion(OpenAiTestData::chat_response("ok", 10, 10))
        .await;

    harness
        .server
        .post("/v1/chat/completions")
        .add_header(api_key_name(), harness.api_key_header())
        .json(&json!({"model": "gpt-alias", "messages": []}))
        .await
        .assert_status_ok();
    harness.wait_for_logs(1, Duration::from_secs(2)).await;

    harness.store.set_model_prices(route.model_id, 1.0, 3.0).await;

    let text = harness.server.get("/metrics").await.text();
    assert_eq!(sample(&text, "gen_ai_proxy_total_price"), Some(40.0));
}

#[tokio::test]
async fn test_metrics_without_logs_still_describe_families() {
    let harness = GatewayTestHarness::new().await;

    let response = harness.server.get("/metrics").await;

    response.assert_status_ok();
    let text = response.text();
    for family in [
        "gen_ai_proxy_total_tokens",
        "gen_ai_proxy_total_price",
        "gen_ai_proxy_total_input_tokens_by_model",
        "gen_ai_proxy_total_output_tokens_by_model",
    ] {
        assert!(text.contains(&format!("# HELP {} ", family)));
        assert_eq!(sample(&text, family), None);
    }
}

#[tokio::test]
async fn test_metrics_store_failure_is_a_server_error() {
    let harness = GatewayTestHarness::new().await;
    harness.store.fail_metrics(true);

    let response = harness.server.get("/metrics").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
}
