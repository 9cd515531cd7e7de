//! Configuration management for the gateway
//!
//! Configuration is loaded once from environment variables at startup and
//! injected into every component as an immutable value.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration
#[derive(Clone)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,

    /// PostgreSQL connection URL
    pub database_url: String,
    /// Maximum pooled database connections
    pub db_max_connections: u32,

    /// Base64 encoded 32-byte master key for stored provider credentials
    pub encryption_key: String,
    /// HMAC secret for management bearer tokens
    pub jwt_secret: String,
    /// Lifetime of issued bearer tokens, in minutes
    pub token_ttl_minutes: i64,
    /// Optional salt prepended to API keys before hashing
    pub api_key_salt: Option<String>,

    /// Timeout for upstream provider calls; unbounded when unset
    pub upstream_timeout: Option<Duration>,

    /// Capacity of the conversation log queue
    pub log_queue_capacity: usize,
    /// Number of background log writers
    pub log_workers: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_source<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let database_url = match get("DATABASE_URL") {
            Some(url) => url,
            None => format!(
                "postgres://{}:{}@{}:{}/{}",
                var_or("POSTGRES_USER", "postgres"),
                var_or("POSTGRES_PASSWORD", ""),
                var_or("DB_HOST", "localhost"),
                var_or("DB_PORT", "5432"),
                var_or("POSTGRES_DB", "gen_ai_proxy"),
            ),
        };

        let upstream_timeout = match get("UPSTREAM_TIMEOUT_SECONDS") {
            Some(raw) => {
                let secs: u64 = raw.parse().context("Invalid UPSTREAM_TIMEOUT_SECONDS")?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        let log_workers: usize = var_or("LOG_WORKERS", "4")
            .parse()
            .context("Invalid LOG_WORKERS")?;
        if log_workers == 0 {
            anyhow::bail!("LOG_WORKERS must be at least 1");
        }

        let log_queue_capacity: usize = var_or("LOG_QUEUE_CAPACITY", "1024")
            .parse()
            .context("Invalid LOG_QUEUE_CAPACITY")?;
        if log_queue_capacity == 0 {
            anyhow::bail!("LOG_QUEUE_CAPACITY must be at least 1");
        }

        Ok(Self {
            host: var_or("SERVER_HOST", "0.0.0.0"),
            port: var_or("SERVER_PORT", "8080")
                .parse()
                .context("Invalid SERVER_PORT")?,

            database_url,
            db_max_connections: var_or("DB_MAX_CONNECTIONS", "10")
                .parse()
                .context("Invalid DB_MAX_CONNECTIONS")?,

            encryption_key: get("ENCRYPTION_KEY").context("ENCRYPTION_KEY must be set")?,
            jwt_secret: get("JWT_SECRET").context("JWT_SECRET must be set")?,
            token_ttl_minutes: var_or("TOKEN_TTL_MINUTES", "120")
                .parse()
                .context("Invalid TOKEN_TTL_MINUTES")?,
            api_key_salt: get("API_KEY_SALT").filter(|s| !s.is_empty()),

            upstream_timeout,

            log_queue_capacity,
            log_workers,
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &"<redacted>")
            .field("db_max_connections", &self.db_max_connections)
            .field("encryption_key", &"<redacted>")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_minutes", &self.token_ttl_minutes)
            .field("api_key_salt", &self.api_key_salt.as_ref().map(|_| "<redacted>"))
            .field("upstream_timeout", &self.upstream_timeout)
            .field("log_queue_capacity", &self.log_queue_capacity)
            .field("log_workers", &self.log_workers)
            .finish()
    }
}
