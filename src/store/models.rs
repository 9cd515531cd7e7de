//! Records read and written by the gateway

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::StoreError;

/// Upstream provider family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "ollama")]
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Ollama => "ollama",
        }
    }

    /// Whether calls to this provider carry the connection's decrypted key
    pub fn requires_credential(&self) -> bool {
        matches!(self, ProviderKind::OpenAi)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(ProviderKind::OpenAi),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(StoreError::CorruptRow(format!("unknown provider type '{}'", other))),
        }
    }
}

/// What a model is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Chat,
    Embedding,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Chat => "chat",
            ModelKind::Embedding => "embedding",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            // Rows created before model kinds existed carry an empty type.
            "chat" | "" => Ok(ModelKind::Chat),
            "embedding" => Ok(ModelKind::Embedding),
            other => Err(StoreError::CorruptRow(format!("unknown model type '{}'", other))),
        }
    }
}

/// Kind of proxied call recorded on a conversation log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Chat,
    Embedding,
}

impl CallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::Chat => "chat",
            CallType::Embedding => "embedding",
        }
    }
}

impl FromStr for CallType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" | "" => Ok(CallType::Chat),
            "embedding" => Ok(CallType::Embedding),
            other => Err(StoreError::CorruptRow(format!("unknown log type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiKeyRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub key_hash: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ConnectionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Provider id as stored; not a database-enforced reference
    pub provider_id: String,
    pub encrypted_api_key: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ProviderRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub base_url: String,
    pub kind: ProviderKind,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ModelRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub connection_id: Uuid,
    pub proxy_model_id: String,
    pub provider_model_id: String,
    pub thinking: bool,
    pub tools_usage: bool,
    pub price_input: f64,
    pub price_output: f64,
    pub kind: ModelKind,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A conversation log about to be appended
#[derive(Debug, Clone)]
pub struct NewConversationLog {
    pub user_id: Uuid,
    pub model_id: Uuid,
    pub connection_id: Uuid,
    pub request_payload: Bytes,
    pub response_payload: Bytes,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub call_type: CallType,
}

/// A persisted conversation log
#[derive(Debug, Clone)]
pub struct ConversationLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub model_id: Uuid,
    pub connection_id: Uuid,
    pub request_payload: Vec<u8>,
    pub response_payload: Vec<u8>,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub created_at: DateTime<Utc>,
    pub call_type: CallType,
}

/// Pagination and filters for listing a user's logs
#[derive(Debug, Clone)]
pub struct LogFilter {
    pub page: u32,
    pub limit: u32,
    pub model_id: Option<Uuid>,
    pub provider_id: Option<String>,
    pub connection_id: Option<Uuid>,
    pub call_type: Option<CallType>,
}

impl LogFilter {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            model_id: None,
            provider_id: None,
            connection_id: None,
            call_type: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogPage {
    pub logs: Vec<ConversationLog>,
    pub total: i64,
}

/// Token sums for one (provider, model, connection) group, with the model's
/// current per-token prices
#[derive(Debug, Clone, PartialEq)]
pub struct UsageTotals {
    pub provider_id: String,
    pub provider_name: String,
    pub model_id: Uuid,
    pub model_name: String,
    pub connection_id: Uuid,
    pub connection_name: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub price_input: f64,
    pub price_output: f64,
}
