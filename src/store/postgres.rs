//! PostgreSQL store
//!
//! Expects the `api_keys`, `connections`, `providers`, `models` and `logs`
//! tables owned by the management service. Prices are `NUMERIC` and read as
//! `float8`; log payloads are `BYTEA`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use super::{
    ApiKeyRecord, CallType, CatalogStore, ConnectionRecord, ConversationLog, GatewayStore,
    IdentityStore, LogFilter, LogPage, LogStore, MetricsStore, ModelRecord, NewConversationLog,
    ProviderRecord, StoreError, UsageTotals,
};

/// Store backed by a pooled PostgreSQL connection
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::new(pool))
    }
}

#[derive(FromRow)]
struct ApiKeyRow {
    id: Uuid,
    user_id: Uuid,
    key_hash: String,
    name: String,
    created_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
}

impl From<ApiKeyRow> for ApiKeyRecord {
    fn from(row: ApiKeyRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            key_hash: row.key_hash,
            name: row.name,
            created_at: row.created_at,
            last_used_at: row.last_used_at,
        }
    }
}

#[derive(FromRow)]
struct ConnectionRow {
    id: Uuid,
    user_id: Uuid,
    provider_id: String,
    encrypted_api_key: String,
    name: String,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<ConnectionRow> for ConnectionRecord {
    fn from(row: ConnectionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            provider_id: row.provider_id,
            encrypted_api_key: row.encrypted_api_key,
            name: row.name,
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(FromRow)]
struct ProviderRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    base_url: String,
    kind: String,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<ProviderRow> for ProviderRecord {
    type Error = StoreError;

    fn try_from(row: ProviderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            base_url: row.base_url,
            kind: row.kind.parse()?,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(FromRow)]
struct ModelRow {
    id: Uuid,
    user_id: Uuid,
    connection_id: Uuid,
    proxy_model_id: String,
    provider_model_id: String,
    thinking: bool,
    tools_usage: bool,
    price_input: f64,
    price_output: f64,
    kind: String,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<ModelRow> for ModelRecord {
    type Error = StoreError;

    fn try_from(row: ModelRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            connection_id: row.connection_id,
            proxy_model_id: row.proxy_model_id,
            provider_model_id: row.provider_model_id,
            thinking: row.thinking,
            tools_usage: row.tools_usage,
            price_input: row.price_input,
            price_output: row.price_output,
            kind: row.kind.parse()?,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(FromRow)]
struct LogRow {
    id: Uuid,
    user_id: Uuid,
    model_id: Uuid,
    connection_id: Uuid,
    request_payload: Option<Vec<u8>>,
    response_payload: Option<Vec<u8>>,
    prompt_tokens: Option<i64>,
    completion_tokens: Option<i64>,
    created_at: DateTime<Utc>,
    call_type: String,
}

impl TryFrom<LogRow> for ConversationLog {
    type Error = StoreError;

    fn try_from(row: LogRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            model_id: row.model_id,
            connection_id: row.connection_id,
            request_payload: row.request_payload.unwrap_or_default(),
            response_payload: row.response_payload.unwrap_or_default(),
            prompt_tokens: row.prompt_tokens.unwrap_or(0),
            completion_tokens: row.completion_tokens.unwrap_or(0),
            created_at: row.created_at,
            call_type: row.call_type.parse::<CallType>()?,
        })
    }
}

#[derive(FromRow)]
struct UsageRow {
    provider_id: String,
    provider_name: String,
    model_id: Uuid,
    model_name: String,
    connection_id: Uuid,
    connection_name: String,
    prompt_tokens: i64,
    completion_tokens: i64,
    price_input: f64,
    price_output: f64,
}

impl From<UsageRow> for UsageTotals {
    fn from(row: UsageRow) -> Self {
        Self {
            provider_id: row.provider_id,
            provider_name: row.provider_name,
            model_id: row.model_id,
            model_name: row.model_name,
            connection_id: row.connection_id,
            connection_name: row.connection_name,
            prompt_tokens: row.prompt_tokens,
            completion_tokens: row.completion_tokens,
            price_input: row.price_input,
            price_output: row.price_output,
        }
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, StoreError> {
        let row = sqlx::query_as::<_, ApiKeyRow>(
            r#"
            SELECT id, user_id, key_hash, name, created_at, last_used_at
            FROM api_keys
            WHERE key_hash = $1
            "#,
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn touch_api_key_last_used(&self, api_key_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = $1")
            .bind(api_key_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn find_model_by_proxy_name(
        &self,
        user_id: Uuid,
        proxy_model_id: &str,
    ) -> Result<Option<ModelRecord>, StoreError> {
        sqlx::query_as::<_, ModelRow>(
            r#"
            SELECT id, user_id, connection_id, proxy_model_id, provider_model_id,
                   thinking, tools_usage,
                   COALESCE(price_input, 0)::float8 AS price_input,
                   COALESCE(price_output, 0)::float8 AS price_output,
                   type AS kind, deleted_at
            FROM models
            WHERE user_id = $1 AND proxy_model_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(proxy_model_id)
        .fetch_optional(&self.pool)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }

    async fn find_connection(
        &self,
        user_id: Uuid,
        connection_id: Uuid,
    ) -> Result<Option<ConnectionRecord>, StoreError> {
        let row = sqlx::query_as::<_, ConnectionRow>(
            r#"
            SELECT id, user_id, provider_id, encrypted_api_key, name, created_at, deleted_at
            FROM connections
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(connection_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_provider(
        &self,
        user_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<ProviderRecord>, StoreError> {
        sqlx::query_as::<_, ProviderRow>(
            r#"
            SELECT id, user_id, name, base_url, type AS kind, deleted_at
            FROM providers
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(provider_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }
}

/// Appends the WHERE clause shared by the count and page queries
fn push_log_filters(builder: &mut QueryBuilder<'_, Postgres>, user_id: Uuid, filter: &LogFilter) {
    builder.push(" WHERE l.user_id = ").push_bind(user_id);
    if let Some(model_id) = filter.model_id {
        builder.push(" AND l.model_id = ").push_bind(model_id);
    }
    if let Some(connection_id) = filter.connection_id {
        builder.push(" AND l.connection_id = ").push_bind(connection_id);
    }
    if let Some(provider_id) = &filter.provider_id {
        builder.push(" AND c.provider_id = ").push_bind(provider_id.clone());
    }
    if let Some(call_type) = filter.call_type {
        builder.push(" AND l.type = ").push_bind(call_type.as_str());
    }
}

#[async_trait]
impl LogStore for PgStore {
    async fn append_conversation_log(&self, record: NewConversationLog) -> Result<Uuid, StoreError> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO logs (id, user_id, model_id, connection_id, request_payload,
                              response_payload, prompt_tokens, completion_tokens, type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.user_id)
        .bind(record.model_id)
        .bind(record.connection_id)
        .bind(record.request_payload.as_ref())
        .bind(record.response_payload.as_ref())
        .bind(record.prompt_tokens)
        .bind(record.completion_tokens)
        .bind(record.call_type.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn list_conversation_logs(
        &self,
        user_id: Uuid,
        filter: &LogFilter,
    ) -> Result<LogPage, StoreError> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM logs l LEFT JOIN connections c ON c.id = l.connection_id",
        );
        push_log_filters(&mut count, user_id, filter);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut page = QueryBuilder::<Postgres>::new(
            r#"
            SELECT l.id, l.user_id, l.model_id, l.connection_id, l.request_payload,
                   l.response_payload, l.prompt_tokens, l.completion_tokens, l.created_at,
                   l.type AS call_type
            FROM logs l
            LEFT JOIN connections c ON c.id = l.connection_id
            "#,
        );
        push_log_filters(&mut page, user_id, filter);
        page.push(" ORDER BY l.created_at DESC LIMIT ")
            .push_bind(i64::from(filter.limit))
            .push(" OFFSET ")
            .push_bind(filter.offset() as i64);

        let logs = page
            .build_query_as::<LogRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LogPage { logs, total })
    }
}

#[async_trait]
impl MetricsStore for PgStore {
    async fn usage_totals(&self) -> Result<Vec<UsageTotals>, StoreError> {
        let rows = sqlx::query_as::<_, UsageRow>(
            r#"
            SELECT p.id::text AS provider_id, p.name AS provider_name,
                   m.id AS model_id, m.proxy_model_id AS model_name,
                   c.id AS connection_id, c.name AS connection_name,
                   COALESCE(SUM(l.prompt_tokens), 0)::int8 AS prompt_tokens,
                   COALESCE(SUM(l.completion_tokens), 0)::int8 AS completion_tokens,
                   COALESCE(m.price_input, 0)::float8 AS price_input,
                   COALESCE(m.price_output, 0)::float8 AS price_output
            FROM logs l
            JOIN models m ON m.id = l.model_id
            JOIN connections c ON c.id = l.connection_id
            JOIN providers p ON p.id::text = c.provider_id
            GROUP BY p.id, p.name, m.id, m.proxy_model_id, c.id, c.name,
                     m.price_input, m.price_output
            ORDER BY p.name, m.proxy_model_id, c.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl GatewayStore for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
