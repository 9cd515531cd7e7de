//! Usage metrics aggregator
//!
//! Recomputes token and price counters from the persisted conversation logs
//! on every scrape. Nothing is cached between scrapes; if the store query
//! fails, the whole render fails and no partial metric set is produced.

use std::fmt::Write;
use std::sync::Arc;

use tracing::debug;

use crate::store::{MetricsStore, StoreError, UsageTotals};

pub const TOTAL_TOKENS: &str = "gen_ai_proxy_total_tokens";
pub const TOTAL_PRICE: &str = "gen_ai_proxy_total_price";
pub const TOTAL_INPUT_TOKENS: &str = "gen_ai_proxy_total_input_tokens_by_model";
pub const TOTAL_OUTPUT_TOKENS: &str = "gen_ai_proxy_total_output_tokens_by_model";

#[derive(Clone)]
pub struct UsageMetricsAggregator {
    store: Arc<dyn MetricsStore>,
}

impl UsageMetricsAggregator {
    pub fn new(store: Arc<dyn MetricsStore>) -> Self {
        Self { store }
    }

    /// Render the usage counter families in Prometheus text format
    pub async fn render(&self) -> Result<String, StoreError> {
        let mut totals = self.store.usage_totals().await?;
        totals.sort_by(|a, b| {
            (&a.provider_name, &a.model_name, &a.connection_name, a.model_id, a.connection_id).cmp(&(
                &b.provider_name,
                &b.model_name,
                &b.connection_name,
                b.model_id,
                b.connection_id,
            ))
        });

        debug!(groups = totals.len(), "Aggregated usage totals");

        let mut out = String::new();
        write_family(&mut out, TOTAL_TOKENS, "Total tokens (input and output) across conversation logs", &totals, |t| {
            (t.prompt_tokens + t.completion_tokens).to_string()
        });
        write_family(&mut out, TOTAL_PRICE, "Total price of conversation logs at current model prices", &totals, |t| {
            total_price(t).to_string()
        });
        write_family(&mut out, TOTAL_INPUT_TOKENS, "Total input tokens by model", &totals, |t| {
            t.prompt_tokens.to_string()
        });
        write_family(&mut out, TOTAL_OUTPUT_TOKENS, "Total output tokens by model", &totals, |t| {
            t.completion_tokens.to_string()
        });
        Ok(out)
    }
}

/// Price of a group at the model's current per-token prices
pub fn total_price(totals: &UsageTotals) -> f64 {
    totals.prompt_tokens as f64 * totals.price_input + totals.completion_tokens as f64 * totals.price_output
}

fn write_family(
    out: &mut String,
    metric: &str,
    help: &str,
    totals: &[UsageTotals],
    value: impl Fn(&UsageTotals) -> String,
) {
    let _ = writeln!(out, "# HELP {metric} {help}");
    let _ = writeln!(out, "# TYPE {metric} counter");
    for t in totals {
        let _ = writeln!(out, "{metric}{{{}}} {}", labels(t), value(t));
    }
}

fn labels(t: &UsageTotals) -> String {
    format!(
        "provider_id=\"{}\",provider_name=\"{}\",model_id=\"{}\",model_name=\"{}\",connection_id=\"{}\",connection_name=\"{}\"",
        escape_label_value(&t.provider_id),
        escape_label_value(&t.provider_name),
        t.model_id,
        escape_label_value(&t.model_name),
        t.connection_id,
        escape_label_value(&t.connection_name),
    )
}

fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out
}
