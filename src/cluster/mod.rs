//! Cluster subsystem.
//!
//! # Data Flow
//! ```text
//! DatabaseConfig (validated)
//!     → pool.rs (open primary: fatal on failure)
//!     → pool.rs (open each replica: skipped on failure)
//!     → cluster.rs (primary pool + replica handles + health state)
//!     → health monitor spawned (if enabled)
//!
//! Per read:
//!     cluster.rs (read lock, healthy snapshot)
//!     → load_balancer (select)
//! ```
//!
//! # Design Decisions
//! - Replica membership is fixed at startup; nodes are only marked, never replaced
//! - One RwLock guards all replica health; selection takes the read side
//! - Health transitions go through cluster methods only

#[allow(clippy::module_inception)]
pub mod cluster;
pub mod pool;

pub use cluster::{Cluster, ClusterStatus, ReplicaStatus};
