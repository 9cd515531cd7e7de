//! OpenAPI specification for the gateway
//!
//! Aggregates the proxy, log, health and metrics endpoints and their schemas
//! into a single OpenAPI document.

use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

use crate::error::{ErrorBody, ErrorResponse};
use crate::routes::{
    chat::ChatCompletionRequest,
    embeddings::EmbeddingRequest,
    health::{DependencyCheck, DependencyChecks, HealthResponse, HealthStats, HealthStatus, PingResponse},
    logs::{ConversationLogView, LogListResponse},
    ollama::OllamaChatRequest,
};
use crate::store::CallType;
use crate::translate::EmbeddingInput;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Gen AI Proxy API",
        version = "1.0.0",
        description = "LLM gateway serving OpenAI and Ollama compatible calls through stored provider connections"
    ),
    paths(
        crate::routes::chat::chat_completions,
        crate::routes::ollama::ollama_chat,
        crate::routes::embeddings::embeddings,
        crate::routes::logs::list_conversation_logs,
        crate::routes::health::ping,
        crate::routes::health::health_check,
        crate::routes::metrics::prometheus_metrics
    ),
    components(
        schemas(
            // Requests
            ChatCompletionRequest,
            OllamaChatRequest,
            EmbeddingRequest,
            EmbeddingInput,
            // Logs
            CallType,
            ConversationLogView,
            LogListResponse,
            // Health
            HealthStatus,
            DependencyCheck,
            DependencyChecks,
            HealthStats,
            HealthResponse,
            PingResponse,
            // Error
            ErrorBody,
            ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Proxy", description = "Provider-compatible proxy endpoints"),
        (name = "Logs", description = "Conversation log access"),
        (name = "Health", description = "Liveness and readiness"),
        (name = "Metrics", description = "Prometheus exposition")
    )
)]
pub struct GatewayApiDoc;

/// Security schemes: API keys for proxy calls, bearer tokens for log access
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}
