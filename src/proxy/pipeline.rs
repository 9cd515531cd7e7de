//! Proxy call pipeline
//!
//! resolve → translate → decrypt (OpenAI only) → relay. Every rejection
//! before the relay happens without touching the network.

use axum::response::Response;
use tracing::Instrument;

use super::logging::RequestContext;
use crate::error::AppResult;
use crate::middleware::auth::Identity;
use crate::resolver::Endpoint;
use crate::routes::metrics::record_request;
use crate::translate::{translate, CanonicalRequest};
use crate::usage::PendingLog;
use crate::AppState;

/// Serve one proxy call for `identity`
///
/// The conversation log stores the translated body exactly as it was sent
/// to the provider.
pub async fn proxy_call(
    state: &AppState,
    identity: Identity,
    endpoint: Endpoint,
    proxy_model: &str,
    request: CanonicalRequest,
) -> AppResult<Response> {
    let ctx = RequestContext::new(endpoint, proxy_model, identity.user_id).with_streaming(request.is_streaming());
    ctx.log_request_start();

    let span = ctx.create_span();
    let result = run(state, identity, endpoint, ctx.clone(), request)
        .instrument(span)
        .await;

    let status = match &result {
        Ok(response) => response.status(),
        Err(e) => {
            let status = e.status_and_code().0;
            if status.is_client_error() {
                ctx.log_warning(&e.to_string());
            } else {
                ctx.log_error(&e.to_string());
            }
            status
        }
    };
    record_request(endpoint.path(), status.as_u16(), ctx.elapsed_secs());

    result
}

async fn run(
    state: &AppState,
    identity: Identity,
    endpoint: Endpoint,
    ctx: RequestContext,
    request: CanonicalRequest,
) -> AppResult<Response> {
    let route = state.resolver.resolve(&identity, &ctx.model, endpoint).await?;
    let kind = route.provider.kind;
    let ctx = ctx.with_provider(kind);

    let upstream = translate(&route, &request)?;

    let credential = if kind.requires_credential() {
        Some(state.vault.decrypt(&route.connection.encrypted_api_key)?)
    } else {
        None
    };

    let pending = PendingLog {
        user_id: identity.user_id,
        model_id: route.model.id,
        connection_id: route.connection.id,
        call_type: endpoint.call_type(),
        provider: kind,
        request_payload: upstream.body.clone(),
    };

    state
        .relay
        .relay(
            upstream.with_credential(credential),
            request.is_streaming(),
            pending,
            &ctx,
            state.logger.clone(),
        )
        .await
}
