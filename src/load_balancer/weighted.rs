//! Weighted load balancing strategy.
//!
//! A shared counter walks `0..total_weight`; each position maps into the
//! cumulative weight bucket of one replica, so over `total_weight`
//! consecutive calls every replica is chosen exactly `weight` times.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::LoadBalancePolicy;
use crate::error::{DbError, DbResult};
use crate::load_balancer::{LoadBalancer, ReplicaNode};

#[derive(Debug, Default)]
pub struct Weighted {
    counter: AtomicU64,
}

impl Weighted {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for Weighted {
    fn select(&self, replicas: &[Arc<ReplicaNode>]) -> DbResult<Arc<ReplicaNode>> {
        if replicas.is_empty() {
            return Err(DbError::NoHealthyReplica);
        }

        let mut total: u64 = replicas.iter().map(|r| u64::from(r.weight())).sum();
        if total == 0 {
            total = replicas.len() as u64;
        }

        let point = self.counter.fetch_add(1, Ordering::Relaxed) % total;
        let mut cumulative = 0u64;
        for replica in replicas {
            cumulative += u64::from(replica.weight().max(1));
            if point < cumulative {
                return Ok(replica.clone());
            }
        }
        // Unreachable while every weight is >= 1.
        Ok(replicas[replicas.len() - 1].clone())
    }

    fn policy(&self) -> LoadBalancePolicy {
        LoadBalancePolicy::Weighted
    }
}
