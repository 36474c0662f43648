//! Pool factory.
//!
//! # Responsibilities
//! - Translate a `NodeConfig` into sqlx connect and pool options
//! - Open a pool, retrying connectivity failures per `FailoverConfig`
//! - Verify liveness before handing the pool out

use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use sqlx::Connection;

use crate::config::{FailoverConfig, NodeConfig};
use crate::error::{DbError, DbResult};
use crate::resilience::retries::retry_connect;

const APPLICATION_NAME: &str = "db-cluster";

/// Connection options for one node. Assumes the node passed validation.
pub fn connect_options(node: &NodeConfig) -> PgConnectOptions {
    let ssl_mode = PgSslMode::from_str(&node.ssl_mode).unwrap_or(PgSslMode::Prefer);
    let mut options = PgConnectOptions::new()
        .host(&node.host)
        .port(u16::try_from(node.port).unwrap_or(5432))
        .database(&node.database)
        .username(&node.user)
        .ssl_mode(ssl_mode)
        .application_name(APPLICATION_NAME);
    if !node.password.is_empty() {
        options = options.password(&node.password);
    }
    if node.statement_timeout_secs > 0 {
        options = options.options([("statement_timeout", format!("{}s", node.statement_timeout_secs))]);
    }
    options
}

/// Pool sizing and lifetime options for one node.
pub fn pool_options(node: &NodeConfig) -> PgPoolOptions {
    let mut options = PgPoolOptions::new()
        .max_connections(node.max_connections)
        .min_connections(node.min_connections)
        .acquire_timeout(node.connect_timeout())
        .test_before_acquire(false);

    if node.max_lifetime_secs > 0 {
        options = options.max_lifetime(Duration::from_secs(node.max_lifetime_secs));
    }
    if node.idle_timeout_secs > 0 {
        options = options.idle_timeout(Duration::from_secs(node.idle_timeout_secs));
    }
    if node.health_check_period_secs > 0 {
        // Ping connections that sat idle longer than the period before reuse.
        let period = Duration::from_secs(node.health_check_period_secs);
        options = options.before_acquire(move |conn, meta| {
            Box::pin(async move {
                if meta.idle_for >= period {
                    conn.ping().await?;
                }
                Ok(true)
            })
        });
    }
    options
}

/// Open a pool for `node` and verify it answers a ping.
pub async fn open_pool(node: &NodeConfig, failover: &FailoverConfig) -> DbResult<PgPool> {
    let name = node.display_name();
    let pool = retry_connect(&name, failover, || async {
        let pool = pool_options(node).connect_with(connect_options(node)).await?;
        ping(&pool).await?;
        Ok::<_, sqlx::Error>(pool)
    })
    .await
    .map_err(|source| DbError::Connect {
        node: name.clone(),
        source,
    })?;

    tracing::info!(
        node = %name,
        max_connections = node.max_connections,
        min_connections = node.min_connections,
        "Connection pool ready"
    );
    Ok(pool)
}

/// Create a pool without touching the network. Connections open on first use.
pub fn lazy_pool(node: &NodeConfig) -> PgPool {
    pool_options(node).connect_lazy_with(connect_options(node))
}

/// Acquire one connection and ping it.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    let mut conn = pool.acquire().await?;
    conn.ping().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> NodeConfig {
        NodeConfig {
            host: "10.1.2.3".to_string(),
            port: 6432,
            database: "app".to_string(),
            user: "svc".to_string(),
            password: "pw".to_string(),
            ssl_mode: "require".to_string(),
            ..NodeConfig::default()
        }
    }

    #[test]
    fn test_connect_options() {
        let options = connect_options(&node());
        assert_eq!(options.get_host(), "10.1.2.3");
        assert_eq!(options.get_port(), 6432);
        assert_eq!(options.get_database(), Some("app"));
        assert_eq!(options.get_username(), "svc");
        assert!(matches!(options.get_ssl_mode(), PgSslMode::Require));
    }

    #[tokio::test]
    async fn test_lazy_pool_opens_nothing() {
        let pool = lazy_pool(&node());
        assert_eq!(pool.size(), 0);
        assert_eq!(pool.num_idle(), 0);
        assert_eq!(pool.options().get_max_connections(), 20);
        pool.close().await;
    }

    #[tokio::test]
    async fn test_open_pool_unreachable() {
        let mut unreachable = node();
        unreachable.host = "127.0.0.1".to_string();
        unreachable.port = 1;
        unreachable.ssl_mode = "disable".to_string();
        unreachable.min_connections = 0;
        unreachable.connect_timeout_secs = 1;
        let failover = FailoverConfig {
            max_retries: 1,
            retry_interval_ms: 1,
            ..FailoverConfig::default()
        };

        let err = open_pool(&unreachable, &failover).await.unwrap_err();
        match err {
            DbError::Connect { node, .. } => assert_eq!(node, "127.0.0.1:1"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
