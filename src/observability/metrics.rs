//! Metrics collection and exposition.
//!
//! # Metrics
//! - `db_queries_total` (counter): operations by op, target, outcome
//! - `db_query_duration_seconds` (histogram): latency by op, target
//! - `db_slow_queries_total` (counter): operations over the slow threshold
//! - `db_replica_health` (gauge): 1=healthy, 0=unhealthy
//! - `db_route_fallbacks_total` (counter): reads served by the other tier

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one finished operation.
pub fn record_query(op: &'static str, target: &str, ok: bool, elapsed: Duration) {
    let outcome = if ok { "ok" } else { "error" };
    metrics::counter!(
        "db_queries_total",
        "op" => op,
        "target" => target.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("db_query_duration_seconds", "op" => op, "target" => target.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_slow_query(op: &'static str) {
    metrics::counter!("db_slow_queries_total", "op" => op).increment(1);
}

pub fn record_replica_health(replica: &str, healthy: bool) {
    metrics::gauge!("db_replica_health", "replica" => replica.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_route_fallback(policy: &'static str) {
    metrics::counter!("db_route_fallbacks_total", "policy" => policy).increment(1);
}
