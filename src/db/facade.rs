//! The public data-access handle.
//!
//! # Responsibilities
//! - Hide standalone vs. clustered topology behind one API
//! - Route reads through the read policy, writes and transactions to the primary
//! - Pair every begin with exactly one commit or rollback, panics included
//! - Record duration of every operation, log failures and slow statements

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use sqlx::postgres::{PgPool, PgQueryResult, PgRow, Postgres};
use sqlx::{Execute, Executor, Transaction};
use tracing::{Instrument, Span};

use crate::cluster::{pool, Cluster, ClusterStatus};
use crate::config::{validate_config, DatabaseConfig, SlowQueryConfig};
use crate::db::slowlog::{SlowLog, SlowQueryEntry};
use crate::error::{DbError, DbResult};
use crate::observability::metrics;
use crate::routing::{Route, Router};

/// A Postgres transaction bound to the primary.
pub type PgTransaction = Transaction<'static, Postgres>;

/// Standalone or clustered data-access handle. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Db {
    inner: Arc<DbInner>,
}

#[derive(Debug)]
struct DbInner {
    topology: Topology,
    slow_log: SlowLog,
    closed: AtomicBool,
    span: Span,
}

#[derive(Debug)]
enum Topology {
    Standalone { pool: PgPool, name: String },
    Clustered(Router),
}

impl Db {
    /// Validate `config`, open every pool and start health checks.
    pub async fn connect(config: DatabaseConfig) -> DbResult<Self> {
        Self::connect_with_span(config, tracing::info_span!("db")).await
    }

    /// Like [`Db::connect`], logging inside the given span.
    pub async fn connect_with_span(mut config: DatabaseConfig, span: Span) -> DbResult<Self> {
        validate_config(&mut config).map_err(DbError::Config)?;

        if config.is_clustered() {
            let cluster_span = tracing::info_span!(parent: &span, "cluster");
            let cluster = Cluster::connect(&config, cluster_span).await?;
            Self::with_cluster(cluster, &config, span)
        } else {
            let pool = pool::open_pool(&config.primary, &config.failover)
                .instrument(span.clone())
                .await?;
            Ok(Self::with_pool(pool, &config, span))
        }
    }

    /// Wrap an already-open pool in standalone mode.
    pub fn with_pool(pool: PgPool, config: &DatabaseConfig, span: Span) -> Self {
        Self::build(
            Topology::Standalone {
                pool,
                name: config.primary.display_name(),
            },
            &config.slow_query,
            span,
        )
    }

    /// Wrap an existing cluster in clustered mode.
    pub fn with_cluster(cluster: Arc<Cluster>, config: &DatabaseConfig, span: Span) -> DbResult<Self> {
        let policy = config.read_policy().map_err(|e| {
            DbError::Config(vec![crate::config::ValidationError::new("read_policy", e.to_string())])
        })?;
        let router = Router::new(
            cluster,
            policy,
            config.health_check.primary_probe_timeout(),
            tracing::info_span!(parent: &span, "router"),
        );
        Ok(Self::build(Topology::Clustered(router), &config.slow_query, span))
    }

    fn build(topology: Topology, slow_query: &SlowQueryConfig, span: Span) -> Self {
        Self {
            inner: Arc::new(DbInner {
                topology,
                slow_log: SlowLog::new(slow_query),
                closed: AtomicBool::new(false),
                span,
            }),
        }
    }

    /// Run a read and collect every row.
    pub async fn query<'q, E>(&self, query: E) -> DbResult<Vec<PgRow>>
    where
        E: Execute<'q, Postgres> + 'q,
    {
        let route = self.route_read(query.sql()).await?;
        let statement = query.sql();
        self.observe("query", &route, statement, route.pool().fetch_all(query)).await
    }

    /// Run a read that must return exactly one row.
    pub async fn query_row<'q, E>(&self, query: E) -> DbResult<PgRow>
    where
        E: Execute<'q, Postgres> + 'q,
    {
        let route = self.route_read(query.sql()).await?;
        let statement = query.sql();
        self.observe("query_row", &route, statement, route.pool().fetch_one(query)).await
    }

    /// Run a read returning at most one row.
    pub async fn fetch_optional<'q, E>(&self, query: E) -> DbResult<Option<PgRow>>
    where
        E: Execute<'q, Postgres> + 'q,
    {
        let route = self.route_read(query.sql()).await?;
        let statement = query.sql();
        self.observe("fetch_optional", &route, statement, route.pool().fetch_optional(query))
            .await
    }

    /// Run a write on the primary.
    pub async fn exec<'q, E>(&self, query: E) -> DbResult<PgQueryResult>
    where
        E: Execute<'q, Postgres> + 'q,
    {
        let route = self.route_master()?;
        let statement = query.sql();
        self.observe("exec", &route, statement, route.pool().execute(query)).await
    }

    /// Run several writes on the primary, all or nothing.
    pub async fn send_batch<'q, E>(&self, queries: Vec<E>) -> DbResult<Vec<PgQueryResult>>
    where
        E: Execute<'q, Postgres> + 'q,
    {
        let route = self.route_master()?;
        let mut tx = route.pool().begin().await.map_err(DbError::Transaction)?;

        let mut results = Vec::with_capacity(queries.len());
        for query in queries {
            let statement = query.sql();
            let outcome = self.observe("batch", &route, statement, (&mut *tx).execute(query)).await;
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => {
                    self.rollback(tx).await;
                    return Err(e);
                }
            }
        }

        tx.commit().await.map_err(DbError::Transaction)?;
        Ok(results)
    }

    /// Begin a transaction on the primary.
    pub async fn begin(&self) -> DbResult<PgTransaction> {
        let route = self.route_master()?;
        route.pool().begin().await.map_err(|e| {
            self.inner.span.in_scope(|| {
                tracing::error!(target_node = %route.label(), error = %e, "Failed to begin transaction");
            });
            DbError::Transaction(e)
        })
    }

    /// Run `f` inside a primary transaction.
    ///
    /// Commits when `f` returns `Ok`. Rolls back when it returns `Err` or
    /// panics; a panic is re-raised after the rollback.
    pub async fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut PgTransaction) -> BoxFuture<'c, Result<T, E>>,
        E: From<DbError> + std::fmt::Display,
    {
        let mut tx = self.begin().await?;
        let start = Instant::now();
        let outcome = AssertUnwindSafe(f(&mut tx)).catch_unwind().await;
        let label = self.primary_label();

        match outcome {
            Ok(Ok(value)) => {
                let committed = tx.commit().await;
                metrics::record_query("transaction", &label, committed.is_ok(), start.elapsed());
                if let Err(e) = committed {
                    self.inner.span.in_scope(|| tracing::error!(error = %e, "Transaction commit failed"));
                    return Err(E::from(DbError::Transaction(e)));
                }
                Ok(value)
            }
            Ok(Err(e)) => {
                self.inner.span.in_scope(|| tracing::warn!(error = %e, "Transaction failed, rolling back"));
                self.rollback(tx).await;
                metrics::record_query("transaction", &label, false, start.elapsed());
                Err(e)
            }
            Err(panic) => {
                self.inner.span.in_scope(|| tracing::error!("Transaction panicked, rolling back"));
                self.rollback(tx).await;
                metrics::record_query("transaction", &label, false, start.elapsed());
                std::panic::resume_unwind(panic)
            }
        }
    }

    /// Check connectivity.
    ///
    /// Clustered mode pings the primary only; a cluster whose replicas are all
    /// unhealthy is reported in the log but does not fail the ping.
    pub async fn ping(&self) -> DbResult<()> {
        self.ensure_open()?;
        match &self.inner.topology {
            Topology::Standalone { pool, .. } => pool::ping(pool).await.map_err(DbError::Query),
            Topology::Clustered(router) => {
                let cluster = router.cluster();
                pool::ping(cluster.primary()).await.map_err(DbError::Query)?;
                if cluster.has_replicas() && cluster.healthy_replicas().is_empty() {
                    self.inner.span.in_scope(|| {
                        tracing::warn!(replicas = cluster.all_replicas().len(), "No healthy replicas, reads are served by the primary");
                    });
                }
                Ok(())
            }
        }
    }

    /// Close every pool. Later calls are no-ops.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            self.inner.span.in_scope(|| tracing::debug!("Database handle already closed"));
            return;
        }
        match &self.inner.topology {
            Topology::Standalone { pool, name } => {
                pool.close().await;
                self.inner.span.in_scope(|| tracing::info!(node = %name, "Database pool closed"));
            }
            Topology::Clustered(router) => router.cluster().close().await,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// The primary pool, bypassing the read policy.
    pub fn master(&self) -> DbResult<PgPool> {
        Ok(self.route_master()?.pool().clone())
    }

    /// A replica pool, bypassing the read policy.
    ///
    /// Standalone mode returns its single pool.
    pub fn slave(&self) -> DbResult<PgPool> {
        self.ensure_open()?;
        match &self.inner.topology {
            Topology::Standalone { pool, .. } => Ok(pool.clone()),
            Topology::Clustered(router) => Ok(router.cluster().replica()?.pool().clone()),
        }
    }

    pub fn is_clustered(&self) -> bool {
        matches!(self.inner.topology, Topology::Clustered(_))
    }

    pub fn cluster(&self) -> Option<&Arc<Cluster>> {
        match &self.inner.topology {
            Topology::Standalone { .. } => None,
            Topology::Clustered(router) => Some(router.cluster()),
        }
    }

    pub fn status(&self) -> Option<ClusterStatus> {
        self.cluster().map(|c| c.status())
    }

    /// Recent slow operations, newest first.
    pub fn slow_queries(&self) -> Vec<SlowQueryEntry> {
        self.inner.slow_log.entries()
    }

    async fn route_read(&self, sql: &str) -> DbResult<Route> {
        self.ensure_open()?;
        match &self.inner.topology {
            Topology::Standalone { pool, name } => Ok(Route::primary(pool.clone(), name)),
            Topology::Clustered(router) => router.route_statement(sql).await,
        }
    }

    fn route_master(&self) -> DbResult<Route> {
        self.ensure_open()?;
        Ok(match &self.inner.topology {
            Topology::Standalone { pool, name } => Route::primary(pool.clone(), name),
            Topology::Clustered(router) => router.route_master(),
        })
    }

    fn primary_label(&self) -> String {
        match &self.inner.topology {
            Topology::Standalone { name, .. } => name.clone(),
            Topology::Clustered(router) => router.cluster().primary_name().to_string(),
        }
    }

    fn ensure_open(&self) -> DbResult<()> {
        if self.is_closed() {
            Err(DbError::Closed)
        } else {
            Ok(())
        }
    }

    async fn observe<T, Fut>(&self, op: &'static str, route: &Route, statement: &str, fut: Fut) -> DbResult<T>
    where
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let start = Instant::now();
        let result = fut.await;
        let elapsed = start.elapsed();

        metrics::record_query(op, route.label(), result.is_ok(), elapsed);
        self.inner.span.in_scope(|| {
            self.inner.slow_log.observe(op, route.label(), statement, elapsed);
            if let Err(e) = &result {
                tracing::error!(
                    op,
                    target_node = %route.label(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    statement = %self.inner.slow_log.truncate(statement),
                    error = %e,
                    "Database operation failed"
                );
            }
        });
        result.map_err(DbError::Query)
    }

    async fn rollback(&self, tx: PgTransaction) {
        if let Err(e) = tx.rollback().await {
            self.inner.span.in_scope(|| tracing::error!(error = %e, "Transaction rollback failed"));
        }
    }
}
