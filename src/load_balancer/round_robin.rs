//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::LoadBalancePolicy;
use crate::error::{DbError, DbResult};
use crate::load_balancer::{LoadBalancer, ReplicaNode};

/// Round-robin selector.
/// Stores an internal counter to rotate through replicas.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn select(&self, replicas: &[Arc<ReplicaNode>]) -> DbResult<Arc<ReplicaNode>> {
        if replicas.is_empty() {
            return Err(DbError::NoHealthyReplica);
        }
        let count = self.counter.fetch_add(1, Ordering::Relaxed);
        Ok(replicas[count % replicas.len()].clone())
    }

    fn policy(&self) -> LoadBalancePolicy {
        LoadBalancePolicy::RoundRobin
    }
}
