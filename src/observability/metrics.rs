//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mirror_rank_requests_total` (counter): ranking requests by outcome
//! - `mirror_rank_duration_seconds` (histogram): end-to-end ranking latency
//! - `mirror_resolver_cache_total` (counter): cache lookups by resolver and result
//! - `mirror_catalog_size` (gauge): mirrors in the last catalog snapshot
//!
//! Without an installed recorder every call is a no-op, so library users and
//! tests pay nothing.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one ranking request.
pub fn record_rank(outcome: &'static str, start: Instant) {
    counter!("mirror_rank_requests_total", "outcome" => outcome).increment(1);
    histogram!("mirror_rank_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// Record a resolver cache lookup.
pub fn record_cache_lookup(resolver: &'static str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("mirror_resolver_cache_total", "resolver" => resolver, "result" => result)
        .increment(1);
}

/// Record the number of mirrors in the latest snapshot.
pub fn record_catalog_size(size: usize) {
    gauge!("mirror_catalog_size").set(size as f64);
}
