//! Embeddings endpoint
//!
//! OpenAI-compatible embeddings. The model must be an embedding model on an
//! OpenAI provider; the response is always buffered.

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
    translate::{CanonicalRequest, EmbeddingCall, EmbeddingInput},
    AppState,
};

/// Embedding request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EmbeddingRequest {
    /// Text or tokens to embed
    pub input: EmbeddingInput,
    /// Proxy model name configured for the caller
    pub model: String,
    /// The format to return the embeddings in (float or base64)
    #[serde(default)]
    pub encoding_format: Option<String>,
}

impl From<EmbeddingRequest> for CanonicalRequest {
    fn from(request: EmbeddingRequest) -> Self {
        CanonicalRequest::Embedding(EmbeddingCall {
            input: request.input,
            encoding_format: request.encoding_format,
        })
    }
}

#[utoipa::path(
    post,
    path = "/v1/embeddings",
    tag = "Proxy",
    request_body = EmbeddingRequest,
    responses(
        (status = 200, description = "Provider response", content_type = "application/json"),
        (status = 400, description = "Invalid request, provider type or model kind mismatch", body = ErrorResponse),
        (status = 401, description = "Missing or unknown API key", body = ErrorResponse),
        (status = 404, description = "Model, connection or provider not found", body = ErrorResponse),
        (status = 502, description = "Upstream provider unreachable", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn embeddings(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    body: Bytes,
) -> AppResult<Response> {
    let request: EmbeddingRequest = parse_body(&body)?;
    let model = request.model.clone();
    proxy_call(&state, identity, Endpoint::OpenAiEmbeddings, &model, request.into()).await
}
