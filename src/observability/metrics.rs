//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define engine metrics (dispatch outcomes, registry size)
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `rewrite_dispatch_total` (counter): dispatches by outcome
//! - `rewrite_rules_registered` (gauge): current registry size
//!
//! # Design Decisions
//! - Recording helpers are no-ops until a recorder is installed, so
//!   library embedders pay nothing unless they opt in
//! - One label (`outcome`), fixed vocabulary

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must run inside a Tokio runtime; the exporter spawns its listener on
/// the current one.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(error) => tracing::error!(%error, "Failed to start metrics endpoint"),
    }
}

/// Count one completed dispatch under its outcome label.
pub fn record_dispatch(outcome: &'static str) {
    counter!("rewrite_dispatch_total", "outcome" => outcome).increment(1);
}

/// Track how many rules the registry currently holds.
pub fn record_registry_size(count: usize) {
    gauge!("rewrite_rules_registered").set(count as f64);
}
