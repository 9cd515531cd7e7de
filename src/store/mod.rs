//! Persistence contracts
//!
//! The gateway only ever reads the catalog (keys, models, connections,
//! providers) and appends conversation logs. Management CRUD lives elsewhere.
//!
//! - [`postgres`] is the production implementation on `sqlx`
//! - `memory` is an in-process implementation for tests

pub mod models;
pub mod postgres;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub use models::{
    ApiKeyRecord, CallType, ConnectionRecord, ConversationLog, LogFilter, LogPage, ModelKind,
    ModelRecord, NewConversationLog, ProviderKind, ProviderRecord, UsageTotals,
};
pub use postgres::PgStore;

#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row: {0}")]
    CorruptRow(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Caller API key lookups
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, StoreError>;

    async fn touch_api_key_last_used(&self, api_key_id: Uuid) -> Result<(), StoreError>;
}

/// Model, connection and provider lookups; soft-deleted rows are never returned
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_model_by_proxy_name(
        &self,
        user_id: Uuid,
        proxy_model_id: &str,
    ) -> Result<Option<ModelRecord>, StoreError>;

    async fn find_connection(
        &self,
        user_id: Uuid,
        connection_id: Uuid,
    ) -> Result<Option<ConnectionRecord>, StoreError>;

    async fn find_provider(
        &self,
        user_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<ProviderRecord>, StoreError>;
}

/// Append-only conversation log
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn append_conversation_log(&self, record: NewConversationLog) -> Result<Uuid, StoreError>;

    async fn list_conversation_logs(
        &self,
        user_id: Uuid,
        filter: &LogFilter,
    ) -> Result<LogPage, StoreError>;
}

/// Read side for usage metrics
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Token sums grouped by (provider, model, connection) over every log
    async fn usage_totals(&self) -> Result<Vec<UsageTotals>, StoreError>;
}

/// Everything the gateway needs from its store
#[async_trait]
pub trait GatewayStore: IdentityStore + CatalogStore + LogStore + MetricsStore {
    async fn ping(&self) -> Result<(), StoreError>;
}
