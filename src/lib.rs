//! Gen AI Proxy - LLM gateway with usage accounting
//!
//! This library provides the core functionality for the gateway server. It
//! authenticates callers, resolves their proxy model names to stored provider
//! connections, relays OpenAI and Ollama compatible calls, and logs every
//! call for token and price accounting.

pub mod config;
pub mod docs;
pub mod error;
pub mod middleware;
pub mod proxy;
pub mod resolver;
pub mod routes;
pub mod security;
pub mod store;
pub mod translate;
pub mod usage;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

pub use crate::config::Config;
pub use crate::resolver::RouteResolver;
pub use crate::security::{BearerTokens, CredentialVault};
pub use crate::store::{GatewayStore, PgStore};
pub use crate::usage::{ConversationLogger, UsageMetricsAggregator};

use crate::proxy::StreamingRelay;
use crate::usage::LoggerConfig;

/// Application state shared across all request handlers
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn GatewayStore>,
    pub vault: CredentialVault,
    pub tokens: BearerTokens,
    pub resolver: RouteResolver,
    pub relay: StreamingRelay,
    /// Background writer for conversation logs
    pub logger: Arc<ConversationLogger>,
    pub aggregator: UsageMetricsAggregator,
    pub start_time: Instant,
}

impl AppState {
    /// Create the application state against PostgreSQL
    pub async fn new(config: Config) -> Result<Self> {
        let store = PgStore::connect(&config.database_url, config.db_max_connections)
            .await
            .context("Failed to connect to the database")?;
        info!(max_connections = config.db_max_connections, "Database pool ready");

        Self::with_store(config, Arc::new(store))
    }

    /// Create the application state over any store implementation
    pub fn with_store<S>(config: Config, store: Arc<S>) -> Result<Self>
    where
        S: GatewayStore + 'static,
    {
        let vault = CredentialVault::from_base64(&config.encryption_key)
            .context("Invalid ENCRYPTION_KEY")?;
        let tokens = BearerTokens::new(&config.jwt_secret, config.token_ttl_minutes);

        // Upstream timeouts are per request; streams may run long
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(100)
            .build()
            .context("Failed to build HTTP client")?;
        let relay = StreamingRelay::new(http_client, config.upstream_timeout);

        let logger = Arc::new(ConversationLogger::new(
            store.clone(),
            LoggerConfig {
                capacity: config.log_queue_capacity,
                workers: config.log_workers,
            },
        ));

        Ok(Self {
            resolver: RouteResolver::new(store.clone()),
            aggregator: UsageMetricsAggregator::new(store.clone()),
            store,
            vault,
            tokens,
            relay,
            logger,
            config,
            start_time: Instant::now(),
        })
    }

    /// Create the application state over the in-memory store
    #[cfg(any(test, feature = "test-utils"))]
    pub fn new_for_testing(config: Config, store: Arc<store::MemoryStore>) -> Result<Self> {
        Self::with_store(config, store)
    }
}
