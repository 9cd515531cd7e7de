//! Ollama chat endpoint
//!
//! Ollama-compatible `/api/chat`. Requests are served only by Ollama
//! providers; responses stream as NDJSON when `stream` is set.

use std::sync::Arc;

use axum::{extract::State, response::Response};
use bytes::Bytes;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    error::{AppResult, ErrorResponse},
    middleware::auth::Identity,
    proxy::proxy_call,
    resolver::Endpoint,
    routes::parse_body,
    translate::{CanonicalRequest, ChatCall, ChatMessage},
    AppState,
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OllamaChatRequest {
    pub model: String,
    #[schema(value_type = Vec<Object>)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    /// Ask thinking-capable models to return their reasoning
    #[serde(default)]
    pub think: bool,
}

impl From<OllamaChatRequest> for CanonicalRequest {
    fn from(request: OllamaChatRequest) -> Self {
        CanonicalRequest::Chat(ChatCall {
            messages: request.messages,
            stream: request.stream,
            tools: None,
            think: request.think,
        })
    }
}

#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "Proxy",
    request_body = OllamaChatRequest,
    responses(
        (status = 200, description = "Provider response", content_type = "application/json"),
        (status = 400, description = "Invalid request or provider type mismatch", body = ErrorResponse),
        (status = 401, description = "Missing or unknown API key", body = ErrorResponse),
        (status = 404, description = "Model, connection or provider not found", body = ErrorResponse),
        (status = 502, description = "Upstream provider unreachable", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn ollama_chat(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    body: Bytes,
) -> AppResult<Response> {
    let request: OllamaChatRequest = parse_body(&body)?;
    let model = request.model.clone();
    proxy_call(&state, identity, Endpoint::OllamaChat, &model, request.into()).await
}
