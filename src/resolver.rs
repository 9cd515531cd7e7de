//! Route resolution
//!
//! Turns a caller's proxy model name into the Model → Connection → Provider
//! chain it is served by, and checks the chain against the endpoint being
//! called. Every call re-reads the catalog.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::auth::Identity,
    store::{CallType, CatalogStore, ConnectionRecord, ModelKind, ModelRecord, ProviderKind, ProviderRecord},
};

/// Proxy endpoint families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    OllamaChat,
    OpenAiChat,
    OpenAiEmbeddings,
}

impl Endpoint {
    /// Provider family this endpoint may reach
    pub fn provider_kind(&self) -> ProviderKind {
        match self {
            Endpoint::OllamaChat => ProviderKind::Ollama,
            Endpoint::OpenAiChat | Endpoint::OpenAiEmbeddings => ProviderKind::OpenAi,
        }
    }

    /// Model kind required by this endpoint, if any
    pub fn required_model_kind(&self) -> Option<ModelKind> {
        match self {
            Endpoint::OpenAiEmbeddings => Some(ModelKind::Embedding),
            Endpoint::OllamaChat | Endpoint::OpenAiChat => None,
        }
    }

    pub fn call_type(&self) -> CallType {
        match self {
            Endpoint::OpenAiEmbeddings => CallType::Embedding,
            Endpoint::OllamaChat | Endpoint::OpenAiChat => CallType::Chat,
        }
    }

    /// Route path, used as a log and metric label
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::OllamaChat => "/api/chat",
            Endpoint::OpenAiChat => "/v1/chat/completions",
            Endpoint::OpenAiEmbeddings => "/v1/embeddings",
        }
    }
}

/// A validated Model → Connection → Provider chain
#[derive(Debug, Clone)]
pub struct ResolvedRoute {
    pub model: ModelRecord,
    pub connection: ConnectionRecord,
    pub provider: ProviderRecord,
}

pub struct RouteResolver {
    catalog: Arc<dyn CatalogStore>,
}

impl RouteResolver {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    pub async fn resolve(
        &self,
        identity: &Identity,
        proxy_model: &str,
        endpoint: Endpoint,
    ) -> AppResult<ResolvedRoute> {
        let user_id = identity.user_id;

        let model = self
            .catalog
            .find_model_by_proxy_name(user_id, proxy_model)
            .await?
            .ok_or_else(|| AppError::ModelNotFound(proxy_model.to_string()))?;

        let connection = self
            .catalog
            .find_connection(user_id, model.connection_id)
            .await?
            .ok_or(AppError::ConnectionNotFound)?;

        let provider_id = Uuid::parse_str(&connection.provider_id).map_err(|_| {
            warn!(
                connection_id = %connection.id,
                "Connection references a malformed provider id"
            );
            AppError::ProviderNotFound
        })?;

        let provider = self
            .catalog
            .find_provider(user_id, provider_id)
            .await?
            .ok_or(AppError::ProviderNotFound)?;

        let expected = endpoint.provider_kind();
        if provider.kind != expected {
            return Err(AppError::ProviderTypeMismatch {
                expected,
                actual: provider.kind,
            });
        }

        if let Some(required) = endpoint.required_model_kind() {
            if model.kind != required {
                return Err(AppError::ModelKindMismatch {
                    expected: required,
                    actual: model.kind,
                });
            }
        }

        debug!(
            model_id = %model.id,
            connection_id = %connection.id,
            provider_id = %provider.id,
            provider = %provider.kind,
            "Route resolved"
        );

        Ok(ResolvedRoute {
            model,
            connection,
            provider,
        })
    }
}
