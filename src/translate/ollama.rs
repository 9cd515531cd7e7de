//! Ollama wire format
//!
//! Ollama is assumed local or self-hosted: no upstream credential is sent.

use serde_json::{json, Value};

use super::{CanonicalRequest, TranslateError};
use crate::store::ProviderKind;

pub const CHAT_PATH: &str = "/api/chat";

pub fn translate(model: &str, request: &CanonicalRequest) -> Result<(&'static str, Value), TranslateError> {
    match request {
        CanonicalRequest::Chat(chat) => {
            let mut body = json!({
                "model": model,
                "messages": chat.messages,
                "stream": chat.stream,
            });
            if chat.think {
                body["think"] = Value::Bool(true);
            }
            Ok((CHAT_PATH, body))
        }
        CanonicalRequest::Embedding(_) => Err(TranslateError::EmbeddingsUnsupported(ProviderKind::Ollama)),
    }
}
