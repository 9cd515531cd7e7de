//! Mock Ollama server
//!
//! Serves `/api/chat` either as a single JSON object or as NDJSON lines.

use serde_json::{json, Value};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, Request, ResponseTemplate,
};

pub const OLLAMA_CHAT_PATH: &str = "/api/chat";

pub struct MockOllama {
    server: MockServer,
}

impl MockOllama {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub async fn mock_chat(&self, body: Value) {
        Mock::given(method("POST"))
            .and(path(OLLAMA_CHAT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_chat_stream(&self, lines: &[Value]) {
        let body: String = lines.iter().map(|l| format!("{}\n", l)).collect();

        Mock::given(method("POST"))
            .and(path(OLLAMA_CHAT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
            .mount(&self.server)
            .await;
    }

    pub async fn received_requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    pub async fn last_request_body(&self) -> Option<Value> {
        self.received_requests()
            .await
            .last()
            .and_then(|r| serde_json::from_slice(&r.body).ok())
    }
}

pub struct OllamaTestData;

impl OllamaTestData {
    pub fn chat_response(content: &str, prompt_eval_count: i64, eval_count: i64) -> Value {
        json!({
            "model": "llama3",
            "created_at": "2024-01-01T00:00:00Z",
            "message": {"role": "assistant", "content": content},
            "done": true,
            "prompt_eval_count": prompt_eval_count,
            "eval_count": eval_count
        })
    }

    pub fn stream_line(content: &str) -> Value {
        json!({
            "model": "llama3",
            "message": {"role": "assistant", "content": content},
            "done": false
        })
    }
}
