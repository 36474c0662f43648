//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Read routed to a replica
//!     → cluster.rs (snapshot of currently healthy replicas)
//!     → Apply the configured algorithm:
//!         - random.rs (uniform pick)
//!         - round_robin.rs (rotate through replicas)
//!         - least_conn.rs (pick replica with fewest acquired connections)
//!         - weighted.rs (pick proportionally to configured weight)
//!     → replica.rs (the chosen node's pool)
//! ```
//!
//! # Design Decisions
//! - Algorithms never see unhealthy replicas; the cluster filters first
//! - Algorithm chosen once from config, no runtime registration
//! - Counters are atomics, independent of the cluster's health lock

use std::fmt;
use std::sync::Arc;

use crate::config::LoadBalancePolicy;
use crate::error::DbResult;

pub mod least_conn;
pub mod random;
pub mod replica;
pub mod round_robin;
pub mod weighted;

pub use least_conn::LeastConnections;
pub use random::RandomSelect;
pub use replica::ReplicaNode;
pub use round_robin::RoundRobin;
pub use weighted::Weighted;

/// Picks one replica from a list of healthy candidates.
pub trait LoadBalancer: Send + Sync + fmt::Debug {
    /// Fails with `DbError::NoHealthyReplica` only when `replicas` is empty.
    fn select(&self, replicas: &[Arc<ReplicaNode>]) -> DbResult<Arc<ReplicaNode>>;

    /// The policy this balancer implements.
    fn policy(&self) -> LoadBalancePolicy;
}

/// Build the balancer for a configured policy.
pub fn for_policy(policy: LoadBalancePolicy) -> Box<dyn LoadBalancer> {
    match policy {
        LoadBalancePolicy::Random => Box::new(RandomSelect::new()),
        LoadBalancePolicy::RoundRobin => Box::new(RoundRobin::new()),
        LoadBalancePolicy::LeastConnections => Box::new(LeastConnections::new()),
        LoadBalancePolicy::Weighted => Box::new(Weighted::new()),
    }
}
