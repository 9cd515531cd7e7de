//! Mock upstream providers
//!
//! wiremock servers standing in for the providers the gateway relays to:
//! - OpenAI compatible APIs (chat completions, embeddings)
//! - Ollama (native chat)
//!
//! Each mock records the requests it received so tests can assert on the
//! translated upstream body and the credential header.

pub mod ollama;

pub use ollama::*;
pub use openai::*;
