//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe each replica (bounded by timeout, one after another)
//!     → Cluster::record_probe
//!     → Update state.rs under the cluster's write lock
//!
//! State machine (state.rs):
//!     Healthy ←→ Unhealthy
//!     With thresholds to prevent flapping
//! ```
//!
//! # Design Decisions
//! - Only replicas are probed; the primary is never taken out of rotation
//! - Health state is per-replica and owned by the cluster
//! - Default thresholds of 1 flip state on a single probe

pub mod active;
pub mod state;

pub use active::HealthMonitor;
pub use state::{ReplicaHealth, Transition};
