//! Replica node abstraction.
//!
//! # Responsibilities
//! - Represent a single read-only database node
//! - Expose the pool's live connection statistics (for Least Connections LB)
//! - Carry the normalized selection weight (for Weighted LB)
//!
//! Health state is not stored here; the cluster owns it.

use sqlx::PgPool;

/// A read-only database node and its pool.
#[derive(Debug)]
pub struct ReplicaNode {
    name: String,
    weight: u32,
    pool: PgPool,
}

impl ReplicaNode {
    /// Create a node. A zero weight is raised to 1.
    pub fn new(name: impl Into<String>, weight: u32, pool: PgPool) -> Self {
        Self {
            name: name.into(),
            weight: weight.max(1),
            pool,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Connections currently checked out of the pool.
    pub fn active_connections(&self) -> usize {
        (self.pool.size() as usize).saturating_sub(self.pool.num_idle())
    }

    /// Total connections (idle + checked out).
    pub fn pool_size(&self) -> u32 {
        self.pool.size()
    }

    pub fn idle_connections(&self) -> usize {
        self.pool.num_idle()
    }
}
