//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dev_proxy_routing_outcomes_total` (counter): decisions by outcome, rule
//! - `dev_proxy_upstream_responses_total` (counter): upstream answers by rule, status
//! - `dev_proxy_upstream_duration_seconds` (histogram): upstream latency by rule
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels limited to rule names and status codes (bounded cardinality)

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Count one routing decision. `rule` is `"none"` for unmatched requests.
pub fn record_outcome(outcome: &'static str, rule: &str) {
    counter!(
        "dev_proxy_routing_outcomes_total",
        "outcome" => outcome,
        "rule" => rule.to_string()
    )
    .increment(1);
}

/// Record an upstream exchange. Status 502 stands for transport failures.
pub fn record_upstream(rule: &str, status: u16, start: Instant) {
    counter!(
        "dev_proxy_upstream_responses_total",
        "rule" => rule.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!("dev_proxy_upstream_duration_seconds", "rule" => rule.to_string())
        .record(start.elapsed().as_secs_f64());
}
