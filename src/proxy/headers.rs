//! Header utilities for upstream provider requests
//!
//! Outbound requests carry a fixed, minimal header set. Client headers are
//! never forwarded, so caller API keys and bearer tokens stay at the gateway.

use anyhow::anyhow;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::AppError;
use crate::security::Credential;

/// Build headers for an upstream provider request
///
/// The credential, when present, goes out as a sensitive bearer header so it
/// is elided from any header debug output.
pub fn build_upstream_headers(credential: Option<&Credential>) -> Result<HeaderMap, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Some(credential) = credential {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", credential.expose()))
            .map_err(|_| AppError::Internal(anyhow!("stored provider credential is not a valid header value")))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    Ok(headers)
}
