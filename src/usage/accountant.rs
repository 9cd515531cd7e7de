//! Token accounting
//!
//! Extracts prompt and completion token counts from a settled response body.
//! The whole body is tried as a single JSON object first; streamed bodies
//! fall back to scanning their frames (SSE `data:` lines or NDJSON lines) for
//! the last one that carries usage.

use serde_json::Value;

use crate::store::{CallType, ProviderKind};

/// Token counts for one call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: i64, completion_tokens: i64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn total(&self) -> i64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Extract usage from `body`, or `None` when no usage could be found
pub fn extract_usage(provider: ProviderKind, call_type: CallType, body: &[u8]) -> Option<TokenUsage> {
    let read = match provider {
        ProviderKind::OpenAi => openai_usage,
        ProviderKind::Ollama => ollama_usage,
    };

    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        if let Some(usage) = read(&value, call_type) {
            return Some(usage);
        }
    }

    frames(body)
        .filter_map(|frame| serde_json::from_str::<Value>(frame).ok())
        .filter_map(|value| read(&value, call_type))
        .last()
}

/// Non-empty JSON payloads of each line, with any SSE `data:` prefix removed
fn frames(body: &[u8]) -> impl Iterator<Item = &str> {
    std::str::from_utf8(body)
        .unwrap_or_default()
        .lines()
        .map(str::trim)
        .map(|line| line.strip_prefix("data:").map(str::trim_start).unwrap_or(line))
        .filter(|line| !line.is_empty() && *line != "[DONE]")
}

fn openai_usage(value: &Value, call_type: CallType) -> Option<TokenUsage> {
    let usage = value.get("usage")?.as_object()?;
    let prompt = usage.get("prompt_tokens")?.as_i64()?;
    let completion = match call_type {
        CallType::Embedding => 0,
        CallType::Chat => usage
            .get("completion_tokens")
            .and_then(Value::as_i64)
            .unwrap_or(0),
    };
    Some(TokenUsage::new(prompt, completion))
}

fn ollama_usage(value: &Value, _call_type: CallType) -> Option<TokenUsage> {
    let prompt = value.get("prompt_eval_count").and_then(Value::as_i64);
    let completion = value.get("eval_count").and_then(Value::as_i64);
    if prompt.is_none() && completion.is_none() {
        return None;
    }
    Some(TokenUsage::new(prompt.unwrap_or(0), completion.unwrap_or(0)))
}
