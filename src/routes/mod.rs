//! HTTP routes for the gateway
//!
//! This module defines all HTTP endpoints exposed by the proxy.

pub mod chat;
pub mod embeddings;
pub mod health;
pub mod logs;
pub mod metrics;
pub mod ollama;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;

use crate::{
    docs::GatewayApiDoc,
    error::{AppError, AppResult},
    middleware::auth::{api_key_auth, bearer_auth},
    AppState,
};

/// Decode a JSON request body
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> AppResult<T> {
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(GatewayApiDoc::openapi())
}

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Proxy routes authenticate with caller API keys
    let proxy_routes = Router::new()
        .route("/api/chat", post(ollama::ollama_chat))
        .route("/v1/chat/completions", post(chat::chat_completions))
        .route("/v1/embeddings", post(embeddings::embeddings))
        .layer(middleware::from_fn_with_state(state.clone(), api_key_auth));

    // Management routes authenticate with bearer tokens
    let management_routes = Router::new()
        .route("/api/conversation_logs", get(logs::list_conversation_logs))
        .layer(middleware::from_fn_with_state(state.clone(), bearer_auth));

    let public_routes = Router::new()
        .route("/ping", get(health::ping))
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/health/live", get(health::liveness_check))
        .route("/metrics", get(metrics::prometheus_metrics))
        .route("/openapi.json", get(openapi_json));

    Router::new()
        .merge(public_routes)
        .merge(proxy_routes)
        .merge(management_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
