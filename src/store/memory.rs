//! In-memory store for tests
//!
//! Holds every table in a single `RwLock` and mirrors the PostgreSQL
//! semantics: soft-deleted catalog rows are invisible, logs are append-only,
//! and usage totals join logs to their model, connection and provider.
//! Failures can be injected per operation family.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    ApiKeyRecord, CatalogStore, ConnectionRecord, ConversationLog, GatewayStore, IdentityStore,
    LogFilter, LogPage, LogStore, MetricsStore, ModelRecord, NewConversationLog, ProviderRecord,
    StoreError, UsageTotals,
};

#[derive(Default)]
struct Tables {
    api_keys: Vec<ApiKeyRecord>,
    connections: Vec<ConnectionRecord>,
    providers: Vec<ProviderRecord>,
    models: Vec<ModelRecord>,
    logs: Vec<ConversationLog>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_catalog: AtomicBool,
    fail_log_writes: AtomicBool,
    fail_metrics: AtomicBool,
    fail_touch: AtomicBool,
    catalog_reads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_api_key(&self, record: ApiKeyRecord) {
        self.tables.write().await.api_keys.push(record);
    }

    pub async fn insert_provider(&self, record: ProviderRecord) {
        self.tables.write().await.providers.push(record);
    }

    pub async fn insert_connection(&self, record: ConnectionRecord) {
        self.tables.write().await.connections.push(record);
    }

    pub async fn insert_model(&self, record: ModelRecord) {
        self.tables.write().await.models.push(record);
    }

    pub async fn soft_delete_model(&self, id: Uuid) {
        let mut tables = self.tables.write().await;
        if let Some(model) = tables.models.iter_mut().find(|m| m.id == id) {
            model.deleted_at = Some(Utc::now());
        }
    }

    pub async fn soft_delete_connection(&self, id: Uuid) {
        let mut tables = self.tables.write().await;
        if let Some(connection) = tables.connections.iter_mut().find(|c| c.id == id) {
            connection.deleted_at = Some(Utc::now());
        }
    }

    pub async fn soft_delete_provider(&self, id: Uuid) {
        let mut tables = self.tables.write().await;
        if let Some(provider) = tables.providers.iter_mut().find(|p| p.id == id) {
            provider.deleted_at = Some(Utc::now());
        }
    }

    /// Update a model's prices in place
    pub async fn set_model_prices(&self, id: Uuid, price_input: f64, price_output: f64) {
        let mut tables = self.tables.write().await;
        if let Some(model) = tables.models.iter_mut().find(|m| m.id == id) {
            model.price_input = price_input;
            model.price_output = price_output;
        }
    }

    /// Every persisted log, oldest first
    pub async fn logs(&self) -> Vec<ConversationLog> {
        self.tables.read().await.logs.clone()
    }

    pub async fn api_key(&self, id: Uuid) -> Option<ApiKeyRecord> {
        self.tables
            .read()
            .await
            .api_keys
            .iter()
            .find(|k| k.id == id)
            .cloned()
    }

    /// Number of catalog lookups served so far
    pub fn catalog_reads(&self) -> usize {
        self.catalog_reads.load(Ordering::SeqCst)
    }

    pub fn fail_catalog(&self, fail: bool) {
        self.fail_catalog.store(fail, Ordering::SeqCst);
    }

    pub fn fail_log_writes(&self, fail: bool) {
        self.fail_log_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_metrics(&self, fail: bool) {
        self.fail_metrics.store(fail, Ordering::SeqCst);
    }

    pub fn fail_touch(&self, fail: bool) {
        self.fail_touch.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable(format!("injected {} failure", what)))
        } else {
            Ok(())
        }
    }

    fn catalog_read(&self) -> Result<(), StoreError> {
        self.catalog_reads.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.fail_catalog, "catalog")
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .api_keys
            .iter()
            .find(|k| k.key_hash == key_hash)
            .cloned())
    }

    async fn touch_api_key_last_used(&self, api_key_id: Uuid) -> Result<(), StoreError> {
        Self::check(&self.fail_touch, "last-used touch")?;
        let mut tables = self.tables.write().await;
        if let Some(key) = tables.api_keys.iter_mut().find(|k| k.id == api_key_id) {
            key.last_used_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn find_model_by_proxy_name(
        &self,
        user_id: Uuid,
        proxy_model_id: &str,
    ) -> Result<Option<ModelRecord>, StoreError> {
        self.catalog_read()?;
        Ok(self
            .tables
            .read()
            .await
            .models
            .iter()
            .find(|m| {
                m.user_id == user_id && m.proxy_model_id == proxy_model_id && m.deleted_at.is_none()
            })
            .cloned())
    }

    async fn find_connection(
        &self,
        user_id: Uuid,
        connection_id: Uuid,
    ) -> Result<Option<ConnectionRecord>, StoreError> {
        self.catalog_read()?;
        Ok(self
            .tables
            .read()
            .await
            .connections
            .iter()
            .find(|c| c.id == connection_id && c.user_id == user_id && c.deleted_at.is_none())
            .cloned())
    }

    async fn find_provider(
        &self,
        user_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<ProviderRecord>, StoreError> {
        self.catalog_read()?;
        Ok(self
            .tables
            .read()
            .await
            .providers
            .iter()
            .find(|p| p.id == provider_id && p.user_id == user_id && p.deleted_at.is_none())
            .cloned())
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn append_conversation_log(&self, record: NewConversationLog) -> Result<Uuid, StoreError> {
        Self::check(&self.fail_log_writes, "log write")?;

        let id = Uuid::new_v4();
        self.tables.write().await.logs.push(ConversationLog {
            id,
            user_id: record.user_id,
            model_id: record.model_id,
            connection_id: record.connection_id,
            request_payload: record.request_payload.to_vec(),
            response_payload: record.response_payload.to_vec(),
            prompt_tokens: record.prompt_tokens,
            completion_tokens: record.completion_tokens,
            created_at: Utc::now(),
            call_type: record.call_type,
        });
        Ok(id)
    }

    async fn list_conversation_logs(
        &self,
        user_id: Uuid,
        filter: &LogFilter,
    ) -> Result<LogPage, StoreError> {
        let tables = self.tables.read().await;

        let provider_of = |connection_id: Uuid| {
            tables
                .connections
                .iter()
                .find(|c| c.id == connection_id)
                .map(|c| c.provider_id.as_str())
        };

        let mut matching: Vec<&ConversationLog> = tables
            .logs
            .iter()
            .filter(|l| l.user_id == user_id)
            .filter(|l| filter.model_id.map_or(true, |id| l.model_id == id))
            .filter(|l| filter.connection_id.map_or(true, |id| l.connection_id == id))
            .filter(|l| filter.call_type.map_or(true, |t| l.call_type == t))
            .filter(|l| {
                filter
                    .provider_id
                    .as_deref()
                    .map_or(true, |p| provider_of(l.connection_id) == Some(p))
            })
            .collect();

        // Newest first; insertion order breaks timestamp ties.
        matching.reverse();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let logs = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit as usize)
            .cloned()
            .collect();

        Ok(LogPage { logs, total })
    }
}

#[async_trait]
impl MetricsStore for MemoryStore {
    async fn usage_totals(&self) -> Result<Vec<UsageTotals>, StoreError> {
        Self::check(&self.fail_metrics, "metrics")?;

        let tables = self.tables.read().await;
        let mut groups: BTreeMap<(String, Uuid, Uuid), UsageTotals> = BTreeMap::new();

        for log in &tables.logs {
            let Some(model) = tables.models.iter().find(|m| m.id == log.model_id) else {
                continue;
            };
            let Some(connection) = tables.connections.iter().find(|c| c.id == log.connection_id)
            else {
                continue;
            };
            let Some(provider) = tables
                .providers
                .iter()
                .find(|p| p.id.to_string() == connection.provider_id)
            else {
                continue;
            };

            let entry = groups
                .entry((provider.id.to_string(), model.id, connection.id))
                .or_insert_with(|| UsageTotals {
                    provider_id: provider.id.to_string(),
                    provider_name: provider.name.clone(),
                    model_id: model.id,
                    model_name: model.proxy_model_id.clone(),
                    connection_id: connection.id,
                    connection_name: connection.name.clone(),
                    prompt_tokens: 0,
                    completion_tokens: 0,
                    price_input: model.price_input,
                    price_output: model.price_output,
                });
            entry.prompt_tokens += log.prompt_tokens;
            entry.completion_tokens += log.completion_tokens;
        }

        Ok(groups.into_values().collect())
    }
}

#[async_trait]
impl GatewayStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Self::check(&self.fail_catalog, "ping")
    }
}
