//! Route selection between the primary and the replicas.
//!
//! # Responsibilities
//! - Apply the read policy to pick a pool for reads
//! - Send every write and transaction to the primary
//! - Fall back to the other tier where the policy allows it

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tracing::{Instrument, Span};

use crate::cluster::{pool, Cluster};
use crate::config::ReadPolicy;
use crate::error::{DbError, DbResult};
use crate::load_balancer::ReplicaNode;
use crate::observability::metrics;
use crate::resilience::timeouts::bounded;
use crate::routing::classifier::classify;

/// Which node a route lands on.
#[derive(Debug, Clone)]
pub enum Target {
    Primary,
    Replica(Arc<ReplicaNode>),
}

/// A chosen pool and the node behind it.
#[derive(Debug, Clone)]
pub struct Route {
    pool: PgPool,
    target: Target,
    label: String,
}

impl Route {
    pub(crate) fn primary(pool: PgPool, name: &str) -> Self {
        Self {
            pool,
            target: Target::Primary,
            label: name.to_string(),
        }
    }

    fn replica(node: Arc<ReplicaNode>) -> Self {
        Self {
            pool: node.pool().clone(),
            label: node.name().to_string(),
            target: Target::Replica(node),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn is_primary(&self) -> bool {
        matches!(self.target, Target::Primary)
    }

    /// Node name for logs and metrics.
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Maps an operation intent onto a pool of the cluster.
#[derive(Debug, Clone)]
pub struct Router {
    cluster: Arc<Cluster>,
    policy: ReadPolicy,
    primary_probe_timeout: Duration,
    span: Span,
}

impl Router {
    pub fn new(cluster: Arc<Cluster>, policy: ReadPolicy, primary_probe_timeout: Duration, span: Span) -> Self {
        Self {
            cluster,
            policy,
            primary_probe_timeout,
            span,
        }
    }

    pub fn policy(&self) -> ReadPolicy {
        self.policy
    }

    pub fn cluster(&self) -> &Arc<Cluster> {
        &self.cluster
    }

    /// Pool for a read, according to the read policy.
    pub async fn route_read(&self) -> DbResult<Route> {
        match self.policy {
            ReadPolicy::AlwaysPrimary => Ok(self.route_master()),
            ReadPolicy::AlwaysReplica => self.cluster.replica().map(Route::replica),
            ReadPolicy::PrimaryPreferred => Ok(self.primary_preferred().instrument(self.span.clone()).await),
            ReadPolicy::ReplicaPreferred => match self.cluster.replica() {
                Ok(node) => Ok(Route::replica(node)),
                Err(e) => {
                    self.fallback(&e);
                    Ok(self.route_master())
                }
            },
        }
    }

    /// Pool for a write or transaction. Always the primary.
    pub fn route_master(&self) -> Route {
        Route::primary(self.cluster.primary().clone(), self.cluster.primary_name())
    }

    /// Pool for a read-routed statement: statements that classify as writes
    /// go to the primary whatever the read policy says.
    pub async fn route_statement(&self, sql: &str) -> DbResult<Route> {
        if classify(sql).is_write() {
            self.span.in_scope(|| tracing::debug!("Write statement issued through a read call, using primary"));
            return Ok(self.route_master());
        }
        self.route_read().await
    }

    async fn primary_preferred(&self) -> Route {
        let probe = bounded(self.primary_probe_timeout, async {
            pool::ping(self.cluster.primary()).await.map_err(DbError::from)
        })
        .await;

        match probe {
            Ok(()) => self.route_master(),
            Err(e) => {
                tracing::warn!(primary = %self.cluster.primary_name(), error = %e, "Primary probe failed, trying a replica");
                metrics::record_route_fallback(self.policy.as_str());
                match self.cluster.replica() {
                    Ok(node) => Route::replica(node),
                    Err(_) => {
                        tracing::warn!("No healthy replica either, using primary anyway");
                        self.route_master()
                    }
                }
            }
        }
    }

    fn fallback(&self, reason: &DbError) {
        metrics::record_route_fallback(self.policy.as_str());
        self.span.in_scope(|| {
            tracing::debug!(policy = %self.policy, reason = %reason, "Read falling back to primary");
        });
    }
}
