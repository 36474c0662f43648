//! Least Connections load balancing strategy.

use std::sync::Arc;

use crate::config::LoadBalancePolicy;
use crate::error::{DbError, DbResult};
use crate::load_balancer::{LoadBalancer, ReplicaNode};

/// Least connections selector.
/// Selects the replica whose pool has the fewest connections checked out.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastConnections {
    fn select(&self, replicas: &[Arc<ReplicaNode>]) -> DbResult<Arc<ReplicaNode>> {
        least_by(replicas, |r| r.active_connections())
    }

    fn policy(&self) -> LoadBalancePolicy {
        LoadBalancePolicy::LeastConnections
    }
}

/// In case of tie, the first one is selected (stability).
fn least_by<F>(replicas: &[Arc<ReplicaNode>], load: F) -> DbResult<Arc<ReplicaNode>>
where
    F: Fn(&ReplicaNode) -> usize,
{
    replicas
        .iter()
        .min_by_key(|r| load(r))
        .cloned()
        .ok_or(DbError::NoHealthyReplica)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use crate::load_balancer::replica::test_support::unreachable_node;

    #[tokio::test]
    async fn test_least_conn() {
        let replicas = vec![unreachable_node("r1", 1), unreachable_node("r2", 1), unreachable_node("r3", 1)];
        let mut loads: HashMap<&str, usize> = HashMap::from([("r1", 4), ("r2", 1), ("r3", 2)]);

        let pick = least_by(&replicas, |r| loads[r.name()]).unwrap();
        assert_eq!(pick.name(), "r2");

        loads.insert("r2", 9);
        let pick = least_by(&replicas, |r| loads[r.name()]).unwrap();
        assert_eq!(pick.name(), "r3");
    }

    #[tokio::test]
    async fn test_least_conn_tie_takes_first() {
        let lb = LeastConnections::new();
        let replicas = vec![unreachable_node("r1", 1), unreachable_node("r2", 1)];

        // Lazy pools have nothing checked out
        assert_eq!(lb.select(&replicas).unwrap().name(), "r1");
        assert!(lb.select(&[]).unwrap_err().is_no_replica());
    }
}
