//! Streaming relay
//!
//! Sends the one outbound request for a proxy call and hands the upstream
//! response back to the client, either buffered or as a live stream. Every
//! call that reached the provider ends in exactly one conversation log job.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use bytes::Bytes;
use futures::StreamExt;
use serde::de::IgnoredAny;

use super::headers::build_upstream_headers;
use super::logging::RequestContext;
use super::tee::RelayStream;
use crate::error::{AppError, AppResult};
use crate::translate::UpstreamRequest;
use crate::usage::{ConversationLogger, PendingLog};

const X_ACCEL_BUFFERING: &str = "x-accel-buffering";

#[derive(Clone)]
pub struct StreamingRelay {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl StreamingRelay {
    pub fn new(client: reqwest::Client, timeout: Option<Duration>) -> Self {
        Self { client, timeout }
    }

    /// Relay one call; `pending` becomes the log once the response settles
    pub async fn relay(
        &self,
        upstream: UpstreamRequest,
        streaming: bool,
        pending: PendingLog,
        ctx: &RequestContext,
        logger: Arc<ConversationLogger>,
    ) -> AppResult<Response> {
        let headers = build_upstream_headers(upstream.credential.as_ref())?;
        ctx.log_upstream_request(&upstream.url, upstream.body.len());

        let mut request = self.client.post(&upstream.url).headers(headers).body(upstream.body);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        // No log is written when the provider could not be reached
        let response = request.send().await.map_err(|e| {
            ctx.log_connection_error(&e.to_string(), &upstream.url);
            AppError::UpstreamUnavailable(connection_failure(&e))
        })?;

        ctx.log_upstream_response(response.status().as_u16());

        if streaming {
            Ok(self.stream(response, pending, ctx.clone(), logger))
        } else {
            self.buffer(response, pending, ctx, &logger).await
        }
    }

    async fn buffer(
        &self,
        response: reqwest::Response,
        pending: PendingLog,
        ctx: &RequestContext,
        logger: &ConversationLogger,
    ) -> AppResult<Response> {
        let status = response.status();
        let upstream_type = response.headers().get(header::CONTENT_TYPE).cloned();

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                ctx.log_error(&format!("reading upstream body: {}", e));
                logger.submit(pending.finish(Bytes::new(), false));
                return Err(AppError::UpstreamUnavailable(
                    "Upstream provider response could not be read".to_string(),
                ));
            }
        };

        let is_json = serde_json::from_slice::<IgnoredAny>(&body).is_ok();
        let content_type = if is_json {
            HeaderValue::from_static("application/json")
        } else {
            ctx.log_warning("upstream body is not valid JSON, forwarding as-is");
            upstream_type.unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"))
        };

        ctx.log_request_complete(status.as_u16(), body.len());
        logger.submit(pending.finish(body.clone(), is_json));

        Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .map_err(|e| AppError::Internal(e.into()))
    }

    fn stream(
        &self,
        response: reqwest::Response,
        pending: PendingLog,
        ctx: RequestContext,
        logger: Arc<ConversationLogger>,
    ) -> Response {
        let relay = RelayStream::new(
            response.bytes_stream().boxed(),
            Box::new(move |forwarded, outcome| {
                ctx.log_stream_ended(outcome, forwarded.len());
                logger.submit(pending.finish(forwarded, true));
            }),
        );

        let mut response = Response::new(Body::from_stream(relay));
        *response.status_mut() = StatusCode::OK;
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(X_ACCEL_BUFFERING, HeaderValue::from_static("no"));
        response
    }
}

/// Client-facing description of a failed upstream exchange
fn connection_failure(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Upstream provider timed out".to_string()
    } else if e.is_connect() {
        "Could not connect to upstream provider".to_string()
    } else {
        "Upstream provider request failed".to_string()
    }
}
