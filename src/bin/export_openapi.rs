//! Export the gateway OpenAPI document to a static JSON file
//!
//! Usage: cargo run --bin export_openapi
//!
//! Writes docs/openapi.json for client generation and API linting.

use std::fs;

use anyhow::Context;
use gen_ai_proxy::docs::GatewayApiDoc;
use utoipa::OpenApi;

fn main() -> anyhow::Result<()> {
    let json = GatewayApiDoc::openapi()
        .to_pretty_json()
        .context("Failed to serialize OpenAPI document")?;

    fs::create_dir_all("docs").context("Failed to create docs directory")?;
    fs::write("docs/openapi.json", json).context("Failed to write docs/openapi.json")?;

    println!("Exported OpenAPI document to docs/openapi.json");
    Ok(())
}
