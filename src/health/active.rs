//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe replicas
//! - Update replica health state based on results

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::cluster::{pool, Cluster};
use crate::config::HealthCheckConfig;
use crate::load_balancer::ReplicaNode;

/// Background task that probes every replica on a fixed interval.
///
/// Holds only a weak reference so a dropped cluster ends the loop.
pub struct HealthMonitor {
    cluster: Weak<Cluster>,
    interval: Duration,
    timeout: Duration,
}

impl HealthMonitor {
    pub fn new(cluster: &Arc<Cluster>, config: &HealthCheckConfig) -> Self {
        Self {
            cluster: Arc::downgrade(cluster),
            interval: config.interval(),
            timeout: config.timeout(),
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            timeout_secs = self.timeout.as_secs(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        // The first tick fires immediately; replicas were just verified.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(cluster) = self.cluster.upgrade() else {
                        tracing::debug!("Cluster dropped, health monitor exiting");
                        break;
                    };
                    probe_all(&cluster, self.timeout).await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

/// Probe every replica once, sequentially, recording each result.
pub async fn probe_all(cluster: &Cluster, timeout: Duration) {
    for replica in cluster.all_replicas() {
        let healthy = probe(&replica, timeout).await;
        cluster.record_probe(&replica, healthy);
    }
}

async fn probe(replica: &ReplicaNode, timeout: Duration) -> bool {
    match time::timeout(timeout, pool::ping(replica.pool())).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(replica = %replica.name(), error = %e, "Health check failed: connection error");
            false
        }
        Err(_) => {
            tracing::warn!(replica = %replica.name(), timeout = ?timeout, "Health check failed: timeout");
            false
        }
    }
}
