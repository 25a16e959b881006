//! Metrics collection and exposition.
//!
//! # Metrics
//! - `edge_requests_total` (counter): requests by method, status
//! - `edge_request_duration_seconds` (histogram): latency distribution
//! - `edge_rate_limit_decisions_total` (counter): admitted / rejected
//! - `edge_rate_limit_actors` (gauge): live per-key actors
//! - `edge_cache_lookups_total` (counter): hit / miss
//! - `edge_cache_purged_total` (counter): entries removed by purge
//! - `edge_uploads_total` (counter): uploads by outcome
//! - `edge_store_errors_total` (counter): store failures by operation, kind

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "edge_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("edge_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limit(admitted: bool) {
    let outcome = if admitted { "admitted" } else { "rejected" };
    counter!("edge_rate_limit_decisions_total", "outcome" => outcome).increment(1);
}

pub fn record_rate_limit_actors(count: usize) {
    gauge!("edge_rate_limit_actors").set(count as f64);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("edge_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_purged(count: usize) {
    counter!("edge_cache_purged_total").increment(count as u64);
}

pub fn record_upload(outcome: &'static str) {
    counter!("edge_uploads_total", "outcome" => outcome).increment(1);
}

pub fn record_store_error(operation: &'static str, kind: &'static str) {
    counter!("edge_store_errors_total", "operation" => operation, "kind" => kind).increment(1);
}
