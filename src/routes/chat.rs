//! Chat completions endpoint
//!
//! OpenAI-compatible chat completions. Only OpenAI providers are reachable
//! here; streaming and buffered responses are relayed as the provider sends
//! them.

use std::sync::Arc;

use axum::{extract::State, response::Response};
use bytes::Bytes;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;
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

/// Chat completion request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChatCompletionRequest {
    /// Proxy model name configured for the caller
    pub model: String,
    /// Accepted for compatibility; the model's own connection is used
    #[serde(default)]
    pub connection_id: Option<String>,
    #[schema(value_type = Vec<Object>)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    /// Tool definitions, forwarded unmodified; must be an array
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<Vec<Object>>)]
    pub tools: Option<Value>,
}

/// Keeps an explicit `null` distinct from an absent field
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl From<ChatCompletionRequest> for CanonicalRequest {
    fn from(request: ChatCompletionRequest) -> Self {
        CanonicalRequest::Chat(ChatCall {
            messages: request.messages,
            stream: request.stream,
            tools: request.tools,
            think: false,
        })
    }
}

/// Handle chat completion requests
#[utoipa::path(
    post,
    path = "/v1/chat/completions",
    tag = "Proxy",
    request_body = ChatCompletionRequest,
    responses(
        (status = 200, description = "Provider response (buffered)", content_type = "application/json"),
        (status = 200, description = "Provider response (streaming)", content_type = "text/event-stream"),
        (status = 400, description = "Invalid request or provider type mismatch", body = ErrorResponse),
        (status = 401, description = "Missing or unknown API key", body = ErrorResponse),
        (status = 404, description = "Model, connection or provider not found", body = ErrorResponse),
        (status = 502, description = "Upstream provider unreachable", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    body: Bytes,
) -> AppResult<Response> {
    let request: ChatCompletionRequest = parse_body(&body)?;

    if let Some(connection_id) = &request.connection_id {
        debug!(connection_id = %connection_id, "Ignoring request connection_id, using the model's connection");
    }

    let model = request.model.clone();
    proxy_call(&state, identity, Endpoint::OpenAiChat, &model, request.into()).await
}
