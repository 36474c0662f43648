//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Cluster, router and db facade produce:
//!     → logging.rs (structured tracing events inside injected spans)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Components receive a span at construction instead of a global logger
//! - Metrics are cheap (atomic increments), recorded on every operation
//! - Without an installed recorder, metric calls are no-ops

pub mod logging;
pub mod metrics;
