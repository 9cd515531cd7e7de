//! Integration tests for the gateway
//!
//! Each test drives the real router over the in-memory store, with wiremock
//! servers standing in for the upstream providers.

mod auth;
mod health;
mod metrics;
mod openai_chat;
