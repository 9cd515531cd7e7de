//! Request logging for proxied calls
//!
//! Every event of one proxy call carries the same short `call` id, so a call
//! can be followed from resolution through the upstream exchange to the end
//! of the relay.

use std::time::Instant;

use tracing::{debug, error, info, warn, Span};
use uuid::Uuid;

use super::tee::RelayOutcome;
use crate::resolver::Endpoint;
use crate::store::ProviderKind;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub trace_id: String,
    pub start_time: Instant,
    /// Set once the route is resolved
    pub provider: Option<ProviderKind>,
    pub endpoint: &'static str,
    /// Proxy model name as sent by the caller
    pub model: String,
    pub streaming: bool,
    pub user_id: Uuid,
}

impl RequestContext {
    pub fn new(endpoint: Endpoint, model: impl Into<String>, user_id: Uuid) -> Self {
        let mut trace_id = Uuid::new_v4().simple().to_string();
        trace_id.truncate(8);
        Self {
            trace_id,
            start_time: Instant::now(),
            provider: None,
            endpoint: endpoint.path(),
            model: model.into(),
            streaming: false,
            user_id,
        }
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = Some(provider);
        self
    }

    fn provider_label(&self) -> &'static str {
        self.provider.map_or("unresolved", |p| p.as_str())
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start_time.elapsed().as_millis()
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn log_request_start(&self) {
        info!(
            call = %self.trace_id,
            endpoint = self.endpoint,
            model = %self.model,
            streaming = self.streaming,
            user_id = %self.user_id,
            "Proxy call received"
        );
    }

    pub fn log_upstream_request(&self, url: &str, body_size: usize) {
        debug!(
            call = %self.trace_id,
            provider = self.provider_label(),
            url,
            body_size,
            "Forwarding to provider"
        );
    }

    pub fn log_upstream_response(&self, status: u16) {
        info!(
            call = %self.trace_id,
            provider = self.provider_label(),
            status,
            elapsed_ms = %self.elapsed_ms(),
            "Provider answered"
        );
    }

    /// Buffered body handed back to the caller
    pub fn log_request_complete(&self, status: u16, response_bytes: usize) {
        info!(
            call = %self.trace_id,
            provider = self.provider_label(),
            model = %self.model,
            status,
            response_bytes,
            elapsed_ms = %self.elapsed_ms(),
            "Buffered response relayed"
        );
    }

    /// End of a streamed relay; anything but a provider-finished stream is a warning
    pub fn log_stream_ended(&self, outcome: RelayOutcome, forwarded_bytes: usize) {
        let provider = self.provider_label();
        let elapsed_ms = self.elapsed_ms();
        if outcome == RelayOutcome::Completed {
            info!(call = %self.trace_id, provider, forwarded_bytes, elapsed_ms = %elapsed_ms, "Stream relay ended");
        } else {
            warn!(
                call = %self.trace_id,
                provider,
                outcome = outcome.as_str(),
                forwarded_bytes,
                elapsed_ms = %elapsed_ms,
                "Stream relay ended early"
            );
        }
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            call = %self.trace_id,
            provider = self.provider_label(),
            endpoint = self.endpoint,
            message,
            "Proxy call warning"
        );
    }

    pub fn log_error(&self, error: &str) {
        error!(
            call = %self.trace_id,
            provider = self.provider_label(),
            endpoint = self.endpoint,
            model = %self.model,
            user_id = %self.user_id,
            elapsed_ms = %self.elapsed_ms(),
            error,
            "Proxy call failed"
        );
    }

    /// The provider could not be reached at all
    pub fn log_connection_error(&self, error: &str, url: &str) {
        error!(
            call = %self.trace_id,
            provider = self.provider_label(),
            url,
            error,
            elapsed_ms = %self.elapsed_ms(),
            "Provider unreachable"
        );
    }

    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "proxy_call",
            call = %self.trace_id,
            endpoint = self.endpoint,
            model = %self.model,
        )
    }
}
