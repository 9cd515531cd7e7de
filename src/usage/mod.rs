//! Usage accounting module
//!
//! Token extraction, asynchronous conversation logging and the scrape-time
//! usage metrics built from persisted logs.

pub mod accountant;
pub mod aggregator;
pub mod logger;

pub use accountant::{extract_usage, TokenUsage};
pub use aggregator::UsageMetricsAggregator;
pub use logger::{ConversationLogger, LogJob, LoggerConfig, PendingLog};
