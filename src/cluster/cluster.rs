//! Primary + replica pool ownership and supervision.
//!
//! # Responsibilities
//! - Own the primary pool and every replica pool for the process lifetime
//! - Track replica health behind a single reader/writer lock
//! - Select a healthy replica through the configured load balancer
//! - Run the background health monitor and stop it on close

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span};

use crate::cluster::pool;
use crate::config::{DatabaseConfig, FailoverConfig, HealthCheckConfig, ValidationError};
use crate::error::{DbError, DbResult};
use crate::health::{active, HealthMonitor, ReplicaHealth, Transition};
use crate::lifecycle::Shutdown;
use crate::load_balancer::{self, LoadBalancer, ReplicaNode};
use crate::observability::metrics;

/// A replica node plus its mutable health state.
#[derive(Debug)]
struct ReplicaHandle {
    node: Arc<ReplicaNode>,
    health: ReplicaHealth,
}

/// Owns the primary pool and the replica handles.
#[derive(Debug)]
pub struct Cluster {
    primary: PgPool,
    primary_name: String,
    replicas: RwLock<Vec<ReplicaHandle>>,
    balancer: Box<dyn LoadBalancer>,
    failover: FailoverConfig,
    health_check: HealthCheckConfig,
    shutdown: Shutdown,
    monitor: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
    span: Span,
}

impl Cluster {
    /// Open every pool described by `config` and start health checks.
    ///
    /// A primary that cannot be reached is fatal. A replica that cannot be
    /// reached is dropped with a warning.
    pub async fn connect(config: &DatabaseConfig, span: Span) -> DbResult<Arc<Self>> {
        let primary = pool::open_pool(&config.primary, &config.failover)
            .instrument(span.clone())
            .await?;

        let mut replicas = Vec::with_capacity(config.replicas.len());
        for node in &config.replicas {
            match pool::open_pool(node, &config.failover).instrument(span.clone()).await {
                Ok(replica_pool) => {
                    let weight = u32::try_from(node.weight.max(1)).unwrap_or(u32::MAX);
                    replicas.push(ReplicaNode::new(node.display_name(), weight, replica_pool));
                }
                Err(e) => {
                    span.in_scope(|| {
                        tracing::warn!(replica = %node.display_name(), error = %e, "Skipping unreachable replica");
                    });
                }
            }
        }

        let cluster = Self::from_pools(config, primary, replicas, span)?;
        if config.health_check.enabled && cluster.has_replicas() {
            cluster.start_health_checks();
        }
        Ok(cluster)
    }

    /// Assemble a cluster from pools that are already open (or lazily connecting).
    ///
    /// Does not start the health monitor; see [`Cluster::start_health_checks`].
    pub fn from_pools(
        config: &DatabaseConfig,
        primary: PgPool,
        replicas: Vec<ReplicaNode>,
        span: Span,
    ) -> DbResult<Arc<Self>> {
        let policy = config
            .load_balance_policy()
            .map_err(|e| DbError::Config(vec![ValidationError::new("load_balance_policy", e.to_string())]))?;

        let handles = replicas
            .into_iter()
            .map(|node| {
                metrics::record_replica_health(node.name(), true);
                ReplicaHandle {
                    node: Arc::new(node),
                    health: ReplicaHealth::default(),
                }
            })
            .collect::<Vec<_>>();

        span.in_scope(|| {
            tracing::info!(
                primary = %config.primary.display_name(),
                replicas = handles.len(),
                load_balance_policy = %policy,
                "Cluster initialized"
            );
        });

        Ok(Arc::new(Self {
            primary,
            primary_name: config.primary.display_name(),
            replicas: RwLock::new(handles),
            balancer: load_balancer::for_policy(policy),
            failover: config.failover.clone(),
            health_check: config.health_check.clone(),
            shutdown: Shutdown::new(),
            monitor: Mutex::new(None),
            closed: AtomicBool::new(false),
            span,
        }))
    }

    /// Spawn the background health monitor. Calling it twice has no effect.
    pub fn start_health_checks(self: &Arc<Self>) {
        let mut monitor = self.monitor.lock().unwrap_or_else(PoisonError::into_inner);
        if monitor.is_some() || self.is_closed() {
            return;
        }
        let task = HealthMonitor::new(self, &self.health_check);
        let shutdown = self.shutdown.subscribe();
        *monitor = Some(tokio::spawn(task.run(shutdown).instrument(self.span.clone())));
    }

    /// The primary pool. Always available while the cluster exists.
    pub fn primary(&self) -> &PgPool {
        &self.primary
    }

    pub fn primary_name(&self) -> &str {
        &self.primary_name
    }

    /// One healthy replica chosen by the load balancer.
    pub fn replica(&self) -> DbResult<Arc<ReplicaNode>> {
        let replicas = self.read_replicas();
        let healthy: Vec<Arc<ReplicaNode>> = replicas
            .iter()
            .filter(|h| h.health.is_healthy())
            .map(|h| h.node.clone())
            .collect();
        drop(replicas);
        self.balancer.select(&healthy)
    }

    /// Replicas currently eligible for reads, in configuration order.
    pub fn healthy_replicas(&self) -> Vec<Arc<ReplicaNode>> {
        self.read_replicas()
            .iter()
            .filter(|h| h.health.is_healthy())
            .map(|h| h.node.clone())
            .collect()
    }

    /// Every replica regardless of health, in configuration order.
    pub fn all_replicas(&self) -> Vec<Arc<ReplicaNode>> {
        self.read_replicas().iter().map(|h| h.node.clone()).collect()
    }

    pub fn has_replicas(&self) -> bool {
        !self.read_replicas().is_empty()
    }

    pub fn is_replica_healthy(&self, replica: &ReplicaNode) -> bool {
        self.read_replicas()
            .iter()
            .find(|h| std::ptr::eq(h.node.as_ref(), replica))
            .map(|h| h.health.is_healthy())
            .unwrap_or(false)
    }

    /// Take a replica out of read rotation. Returns false for a foreign node.
    pub fn mark_unhealthy(&self, replica: &ReplicaNode) -> bool {
        self.update_health(replica, |health| health.mark_unhealthy())
    }

    /// Put a replica back into read rotation. Returns false for a foreign node.
    pub fn mark_healthy(&self, replica: &ReplicaNode) -> bool {
        self.update_health(replica, |health| health.mark_healthy())
    }

    /// Feed one probe result through the threshold state machine.
    pub fn record_probe(&self, replica: &ReplicaNode, success: bool) -> bool {
        let failure_threshold = self.failover.failure_threshold;
        let recovery_threshold = self.failover.recovery_threshold;
        self.update_health(replica, |health| {
            if success {
                health.record_success(recovery_threshold)
            } else {
                health.record_failure(failure_threshold)
            }
        })
    }

    /// Run one probe pass over every replica now.
    pub async fn check_replicas(&self) {
        active::probe_all(self, self.health_check.timeout())
            .instrument(self.span.clone())
            .await;
    }

    /// Serializable view of the cluster for diagnostics.
    pub fn status(&self) -> ClusterStatus {
        let replicas: Vec<ReplicaStatus> = self
            .read_replicas()
            .iter()
            .map(|h| ReplicaStatus {
                name: h.node.name().to_string(),
                healthy: h.health.is_healthy(),
                failure_count: h.health.failure_count(),
                secs_since_check: h.health.last_check().map(|t| t.elapsed().as_secs_f64()),
                weight: h.node.weight(),
                pool_size: h.node.pool_size(),
                idle_connections: h.node.idle_connections(),
            })
            .collect();

        ClusterStatus {
            primary: self.primary_name.clone(),
            primary_pool_size: self.primary.size(),
            primary_idle_connections: self.primary.num_idle(),
            load_balance_policy: self.balancer.policy().to_string(),
            healthy_replicas: replicas.iter().filter(|r| r.healthy).count(),
            replicas,
            closed: self.is_closed(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop health checks, then close the primary and every replica pool.
    ///
    /// Only the first call does anything.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            self.span.in_scope(|| tracing::debug!("Cluster already closed"));
            return;
        }

        // Taking the handle waits out a concurrent start, so its task is
        // subscribed before the signal goes out.
        let monitor = self.monitor.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.shutdown.trigger();
        let replicas = self.all_replicas();

        async move {
            if let Some(task) = monitor {
                if let Err(e) = task.await {
                    tracing::warn!(error = %e, "Health monitor task ended abnormally");
                }
            }

            self.primary.close().await;
            for replica in &replicas {
                replica.pool().close().await;
            }
            tracing::info!(replicas = replicas.len(), "Cluster closed");
        }
        .instrument(self.span.clone())
        .await
    }

    fn update_health<F>(&self, replica: &ReplicaNode, change: F) -> bool
    where
        F: FnOnce(&mut ReplicaHealth) -> Transition,
    {
        let mut replicas = self.write_replicas();
        let Some(handle) = replicas.iter_mut().find(|h| std::ptr::eq(h.node.as_ref(), replica)) else {
            return false;
        };

        let transition = change(&mut handle.health);
        let failures = handle.health.failure_count();
        drop(replicas);

        let _entered = self.span.enter();
        match transition {
            Transition::BecameUnhealthy => {
                tracing::warn!(replica = %replica.name(), failure_count = failures, "Replica marked unhealthy");
                metrics::record_replica_health(replica.name(), false);
            }
            Transition::BecameHealthy => {
                tracing::info!(replica = %replica.name(), "Replica marked healthy");
                metrics::record_replica_health(replica.name(), true);
            }
            Transition::Unchanged => {
                tracing::trace!(replica = %replica.name(), failure_count = failures, "Replica health unchanged");
            }
        }
        true
    }

    fn read_replicas(&self) -> RwLockReadGuard<'_, Vec<ReplicaHandle>> {
        self.replicas.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_replicas(&self) -> RwLockWriteGuard<'_, Vec<ReplicaHandle>> {
        self.replicas.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Diagnostic snapshot of the whole cluster.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterStatus {
    pub primary: String,
    pub primary_pool_size: u32,
    pub primary_idle_connections: usize,
    pub load_balance_policy: String,
    pub healthy_replicas: usize,
    pub replicas: Vec<ReplicaStatus>,
    pub closed: bool,
}

/// Diagnostic snapshot of one replica.
#[derive(Debug, Clone, Serialize)]
pub struct ReplicaStatus {
    pub name: String,
    pub healthy: bool,
    pub failure_count: u32,
    pub secs_since_check: Option<f64>,
    pub weight: u32,
    pub pool_size: u32,
    pub idle_connections: usize,
}
