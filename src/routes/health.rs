//! Health check endpoints
//!
//! Provides endpoints for monitoring and container orchestration:
//! - `/ping` - Bare liveness reply
//! - `/health` - Full health check with dependency status
//! - `/health/ready` - Readiness probe
//! - `/health/live` - Liveness probe

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::AppState;

/// Health status enum
#[derive(Debug, Clone, Copy, Serialize, PartialEq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    fn http_status(self) -> StatusCode {
        match self {
            HealthStatus::Healthy => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Individual dependency check result
#[derive(Debug, Serialize, ToSchema)]
pub struct DependencyCheck {
    pub status: HealthStatus,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DependencyChecks {
    pub store: DependencyCheck,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthStats {
    pub uptime_seconds: u64,
    /// Conversation logs dropped because the queue was full
    pub dropped_logs: u64,
}

/// Full health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: String,
    pub checks: DependencyChecks,
    pub stats: HealthStats,
}

/// Simple health response for liveness/readiness
#[derive(Debug, Serialize, ToSchema)]
pub struct SimpleHealthResponse {
    pub status: HealthStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PingResponse {
    pub message: String,
}

/// Time one store round trip
async fn check_store(state: &AppState) -> DependencyCheck {
    let start = Instant::now();
    let outcome = state.store.ping().await;
    let latency_ms = start.elapsed().as_millis() as u64;

    DependencyCheck {
        status: if outcome.is_ok() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        },
        latency_ms,
        error: outcome.err().map(|e| e.to_string()),
    }
}

fn probe(status: HealthStatus) -> (StatusCode, Json<SimpleHealthResponse>) {
    (status.http_status(), Json(SimpleHealthResponse { status }))
}

#[utoipa::path(
    get,
    path = "/ping",
    tag = "Health",
    responses((status = 200, description = "Process is up", body = PingResponse))
)]
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        message: "pong".to_string(),
    })
}

/// Store reachability plus uptime and log queue statistics
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Store reachable", body = HealthResponse),
        (status = 503, description = "Store unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let store = check_store(&state).await;
    let status = store.status;

    let body = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        checks: DependencyChecks { store },
        stats: HealthStats {
            uptime_seconds: state.start_time.elapsed().as_secs(),
            dropped_logs: state.logger.dropped(),
        },
    };

    (status.http_status(), Json(body))
}

/// Ready once the store answers
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<SimpleHealthResponse>) {
    probe(check_store(&state).await.status)
}

pub async fn liveness_check() -> (StatusCode, Json<SimpleHealthResponse>) {
    probe(HealthStatus::Healthy)
}
