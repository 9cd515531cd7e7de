//! API Documentation module
//!
//! Provides the OpenAPI document for the gateway using utoipa.

mod openapi;

pub use openapi::GatewayApiDoc;
