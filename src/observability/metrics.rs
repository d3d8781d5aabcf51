//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by route, status
//! - `proxy_request_duration_seconds` (histogram): latency by route
//! - `proxy_cache_lookups_total` (counter): HIT/MISS/DISABLED by route
//! - `proxy_cache_evictions_total` (counter): entries removed, by reason
//! - `proxy_upstream_errors_total` (counter): failed fetches by kind
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Prometheus exporter is opt-in via `observability.metrics_enabled`

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &str, status: u16, start: Instant) {
    metrics::counter!(
        "proxy_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("proxy_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_cache_lookup(route: &str, result: &'static str) {
    metrics::counter!(
        "proxy_cache_lookups_total",
        "route" => route.to_string(),
        "result" => result
    )
    .increment(1);
}

pub fn record_cache_evictions(reason: &'static str, count: usize) {
    metrics::counter!("proxy_cache_evictions_total", "reason" => reason).increment(count as u64);
}

pub fn record_upstream_error(kind: &'static str) {
    metrics::counter!("proxy_upstream_errors_total", "kind" => kind).increment(1);
}
