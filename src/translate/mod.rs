//! Request translation
//!
//! Maps a canonical chat or embedding call onto the wire shape of the
//! resolved provider. Dispatch on [`ProviderKind`] happens once, here.

pub mod ollama;
pub mod openai;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use utoipa::ToSchema;

use crate::resolver::ResolvedRoute;
use crate::security::Credential;
use crate::store::ProviderKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error("Translation failed: tools must be a JSON array")]
    ToolsNotArray,

    #[error("Translation failed: {0} providers do not serve embeddings")]
    EmbeddingsUnsupported(ProviderKind),

    #[error("Translation failed: {0}")]
    Encode(String),
}

/// A chat message, passed upstream as given
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Value,
    /// Any other message fields (tool calls, names, images)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Value::String(content.into()),
            extra: Map::new(),
        }
    }
}

/// Embedding input types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum EmbeddingInput {
    /// Single string
    String(String),
    /// Array of strings
    StringArray(Vec<String>),
    /// Array of token IDs
    Tokens(Vec<u32>),
    /// Array of token ID arrays
    TokenArrays(Vec<Vec<u32>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatCall {
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    /// Opaque tool definitions, forwarded unmodified
    pub tools: Option<Value>,
    pub think: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingCall {
    pub input: EmbeddingInput,
    pub encoding_format: Option<String>,
}

/// Provider-independent form of an inbound proxy call
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalRequest {
    Chat(ChatCall),
    Embedding(EmbeddingCall),
}

impl CanonicalRequest {
    pub fn is_streaming(&self) -> bool {
        match self {
            CanonicalRequest::Chat(chat) => chat.stream,
            CanonicalRequest::Embedding(_) => false,
        }
    }
}

/// A fully built outbound request
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub url: String,
    pub body: Bytes,
    pub credential: Option<Credential>,
}

impl UpstreamRequest {
    pub fn with_credential(mut self, credential: Option<Credential>) -> Self {
        self.credential = credential;
        self
    }
}

/// Translate `request` for the provider behind `route`
pub fn translate(route: &ResolvedRoute, request: &CanonicalRequest) -> Result<UpstreamRequest, TranslateError> {
    let base_url = route.provider.base_url.trim_end_matches('/');
    let model = route.model.provider_model_id.as_str();

    let (path, body) = match route.provider.kind {
        ProviderKind::OpenAi => openai::translate(model, request)?,
        ProviderKind::Ollama => ollama::translate(model, request)?,
    };

    let body = serde_json::to_vec(&body).map_err(|e| TranslateError::Encode(e.to_string()))?;

    Ok(UpstreamRequest {
        url: format!("{}{}", base_url, path),
        body: Bytes::from(body),
        credential: None,
    })
}
