//! OpenAI wire format

use serde_json::{json, Value};

use super::{CanonicalRequest, TranslateError};

pub const CHAT_PATH: &str = "/chat/completions";
pub const EMBEDDINGS_PATH: &str = "/embeddings";

/// Build the upstream path and JSON body
pub fn translate(model: &str, request: &CanonicalRequest) -> Result<(&'static str, Value), TranslateError> {
    match request {
        CanonicalRequest::Chat(chat) => {
            let mut body = json!({
                "model": model,
                "messages": chat.messages,
                "stream": chat.stream,
            });
            match &chat.tools {
                None => {}
                Some(tools @ Value::Array(_)) => {
                    body["tools"] = tools.clone();
                }
                Some(_) => return Err(TranslateError::ToolsNotArray),
            }
            Ok((CHAT_PATH, body))
        }
        CanonicalRequest::Embedding(embedding) => {
            let mut body = json!({
                "model": model,
                "input": embedding.input,
            });
            if let Some(format) = &embedding.encoding_format {
                body["encoding_format"] = Value::String(format.clone());
            }
            Ok((EMBEDDINGS_PATH, body))
        }
    }
}
