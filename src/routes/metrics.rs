//! Prometheus metrics endpoint
//!
//! `/metrics` serves the usage counters recomputed from conversation logs,
//! followed by the process's operational metrics.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use tracing::error;

use crate::AppState;

const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Global Prometheus handle for metrics export
static PROMETHEUS_HANDLE: Lazy<PrometheusHandle> = Lazy::new(|| {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
});

/// Initialize metrics (call once at startup)
pub fn init_metrics() {
    // Force initialization of the lazy static
    let _ = &*PROMETHEUS_HANDLE;

    register_metrics();
}

fn register_metrics() {
    metrics::describe_counter!(
        "gen_ai_proxy_requests_total",
        "Total number of proxy calls by endpoint and status"
    );
    metrics::describe_histogram!(
        "gen_ai_proxy_request_duration_seconds",
        "Time until the proxy response started, in seconds"
    );
    metrics::describe_counter!(
        "gen_ai_proxy_logs_dropped_total",
        "Conversation logs dropped because the queue was full or closed"
    );
    metrics::describe_counter!(
        "gen_ai_proxy_log_persist_failures_total",
        "Conversation logs that could not be written to the store"
    );
    metrics::describe_counter!(
        "gen_ai_proxy_accounting_skipped_total",
        "Responses whose token usage could not be extracted"
    );
}

#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Metrics",
    responses(
        (status = 200, description = "Prometheus text exposition", content_type = "text/plain"),
        (status = 500, description = "Usage totals could not be read")
    )
)]
pub async fn prometheus_metrics(State(state): State<Arc<AppState>>) -> Response {
    let mut body = match state.aggregator.render().await {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, "Failed to aggregate usage metrics");
            return (StatusCode::INTERNAL_SERVER_ERROR, "usage metrics unavailable\n").into_response();
        }
    };
    body.push_str(&PROMETHEUS_HANDLE.render());

    ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response()
}

/// Record a finished proxy call
pub fn record_request(endpoint: &'static str, status: u16, duration_secs: f64) {
    metrics::counter!(
        "gen_ai_proxy_requests_total",
        "endpoint" => endpoint,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gen_ai_proxy_request_duration_seconds", "endpoint" => endpoint)
        .record(duration_secs);
}

pub fn record_log_dropped() {
    metrics::counter!("gen_ai_proxy_logs_dropped_total").increment(1);
}

pub fn record_log_persist_failure() {
    metrics::counter!("gen_ai_proxy_log_persist_failures_total").increment(1);
}

pub fn record_accounting_skipped(provider: &'static str) {
    metrics::counter!("gen_ai_proxy_accounting_skipped_total", "provider" => provider).increment(1);
}
