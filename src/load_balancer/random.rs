//! Uniform random load balancing strategy.

use std::sync::Arc;

use rand::Rng;

use crate::config::LoadBalancePolicy;
use crate::error::{DbError, DbResult};
use crate::load_balancer::{LoadBalancer, ReplicaNode};

/// Picks a replica uniformly at random.
#[derive(Debug, Default)]
pub struct RandomSelect;

impl RandomSelect {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for RandomSelect {
    fn select(&self, replicas: &[Arc<ReplicaNode>]) -> DbResult<Arc<ReplicaNode>> {
        if replicas.is_empty() {
            return Err(DbError::NoHealthyReplica);
        }
        let index = rand::thread_rng().gen_range(0..replicas.len());
        Ok(replicas[index].clone())
    }

    fn policy(&self) -> LoadBalancePolicy {
        LoadBalancePolicy::Random
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::replica::test_support::unreachable_node;

    #[tokio::test]
    async fn test_random_covers_all() {
        let lb = RandomSelect::new();
        let replicas = vec![unreachable_node("a", 1), unreachable_node("b", 1), unreachable_node("c", 1)];

        let mut seen = std::collections::HashSet::new();
        for _ in 0..300 {
            seen.insert(lb.select(&replicas).unwrap().name().to_string());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_random_empty() {
        let lb = RandomSelect::new();
        assert!(lb.select(&[]).unwrap_err().is_no_replica());
    }
}
