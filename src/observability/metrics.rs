//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): proxied requests by method, status, outcome
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_guard_rejections_total` (counter): 401s by reason
//! - `gateway_session_touches_total` (counter): touches by result
//! - `gateway_upstream_failures_total` (counter): 502s by kind
//! - `gateway_html_rewrites_total` / `gateway_html_rewritten_bytes_total`
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Prometheus exporter on its own listener, scrape-friendly

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus exporter on the given address.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter started"),
        Err(e) => tracing::error!(error = %e, "Failed to start metrics exporter"),
    }
}

/// Record one completed request through the pipeline.
pub fn record_request(method: &str, status: u16, outcome: &str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "outcome" => outcome.to_string(),
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// Record a 401 produced by the access guard.
pub fn record_guard_rejection(reason: &'static str) {
    counter!("gateway_guard_rejections_total", "reason" => reason).increment(1);
}

/// Record the outcome of a best-effort session touch.
pub fn record_session_touch(result: &'static str) {
    counter!("gateway_session_touches_total", "result" => result).increment(1);
}

/// Record an upstream transport failure.
pub fn record_upstream_failure(kind: &'static str) {
    counter!("gateway_upstream_failures_total", "kind" => kind).increment(1);
}

/// Record one HTML body rewrite.
pub fn record_html_rewrite(bytes: usize) {
    counter!("gateway_html_rewrites_total").increment(1);
    counter!("gateway_html_rewritten_bytes_total").increment(bytes as u64);
}
