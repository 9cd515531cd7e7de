//! Authentication middleware
//!
//! Two schemes, chosen per route group:
//! - API keys (proxy routes): `X-API-Key`, falling back to `Authorization: Bearer`
//! - Bearer tokens (management routes): HS256 JWT in `Authorization: Bearer`
//!
//! Both attach an [`Identity`] to the request extensions; handlers take it as
//! an extractor.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::{error::AppError, AppState};

/// Header carrying a caller API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// How the caller authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    ApiKey,
    BearerToken,
}

/// Resolved caller identity for the lifetime of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub scheme: AuthScheme,
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Identity>().copied().ok_or_else(|| {
            warn!("Identity not found in request extensions");
            AppError::IdentityMissing
        })
    }
}

/// Extract the Authorization header and return the bearer token
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    let token = auth_header.strip_prefix("Bearer ")?;
    if token.is_empty() || token.contains(' ') {
        None
    } else {
        Some(token)
    }
}

/// Secret presented as an API key, from `X-API-Key` or a bearer header
pub fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = headers
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
    {
        return Some(key);
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(extract_bearer_token)
}

/// One-way hash under which API keys are stored
pub fn hash_api_key(secret: &str, salt: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    if let Some(salt) = salt {
        hasher.update(salt.as_bytes());
    }
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// API key middleware for the proxy routes
///
/// Known and unknown keys take the same path: one hash and one indexed
/// lookup. The last-used update runs detached and never fails the request.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn api_key_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key_hash = {
        let secret = extract_api_key(request.headers()).ok_or_else(|| {
            debug!("Missing API key");
            AppError::Unauthenticated
        })?;
        hash_api_key(secret, state.config.api_key_salt.as_deref())
    };

    let record = state
        .store
        .find_api_key_by_hash(&key_hash)
        .await?
        .ok_or_else(|| {
            debug!("Unknown API key");
            AppError::Unauthenticated
        })?;

    let store = state.store.clone();
    let api_key_id = record.id;
    tokio::spawn(async move {
        if let Err(e) = store.touch_api_key_last_used(api_key_id).await {
            warn!(api_key_id = %api_key_id, error = %e, "Failed to update API key last-used time");
        }
    });

    debug!(user_id = %record.user_id, api_key_id = %record.id, "API key authenticated");

    request.extensions_mut().insert(Identity {
        user_id: record.user_id,
        scheme: AuthScheme::ApiKey,
    });

    Ok(next.run(request).await)
}

/// Bearer token middleware for the management routes
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn bearer_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user_id = {
        let token = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(extract_bearer_token)
            .ok_or(AppError::Unauthenticated)?;

        state.tokens.verify(token).map_err(|e| {
            debug!(error = %e, "Bearer token rejected");
            AppError::Unauthenticated
        })?
    };

    request.extensions_mut().insert(Identity {
        user_id,
        scheme: AuthScheme::BearerToken,
    });

    Ok(next.run(request).await)
}
