//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use db_cluster::cluster::pool;
use db_cluster::config::{DatabaseConfig, NodeConfig};
use db_cluster::load_balancer::ReplicaNode;
use db_cluster::Cluster;
use tracing::Span;

/// A node on a closed local port. Connections fail fast.
pub fn unreachable_node(name: &str) -> NodeConfig {
    NodeConfig {
        name: name.to_string(),
        host: "127.0.0.1".to_string(),
        port: 1,
        database: "app".to_string(),
        user: "app".to_string(),
        ssl_mode: "disable".to_string(),
        min_connections: 0,
        connect_timeout_secs: 1,
        ..NodeConfig::default()
    }
}

/// A clustered config whose nodes are all unreachable.
pub fn unreachable_config(replicas: &[&str]) -> DatabaseConfig {
    DatabaseConfig::clustered(
        unreachable_node("primary"),
        replicas.iter().map(|name| unreachable_node(name)).collect(),
    )
}

/// Assemble a cluster over lazy pools without touching the network.
pub fn lazy_cluster(config: &DatabaseConfig) -> Arc<Cluster> {
    let primary = pool::lazy_pool(&config.primary);
    let replicas = config
        .replicas
        .iter()
        .map(|node| ReplicaNode::new(node.display_name(), node.weight.max(1) as u32, pool::lazy_pool(node)))
        .collect();
    Cluster::from_pools(config, primary, replicas, Span::none()).expect("valid cluster config")
}

/// Connection string of a live test database, if one is configured.
pub fn database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok().filter(|url| !url.is_empty())
}
