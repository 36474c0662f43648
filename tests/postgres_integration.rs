//! End-to-end tests against a live Postgres.
//!
//! Skipped unless `DATABASE_URL` is set. The replicas point at the same
//! database as the primary so writes are visible to routed reads.

use std::time::Duration;

use db_cluster::config::{DatabaseConfig, NodeConfig, ReadPolicy};
use db_cluster::routing::{Router, Target};
use db_cluster::{Db, DbError};
use futures_util::FutureExt;
use sqlx::Row;
use tracing::Span;

mod common;

fn live_config(url: &str, replicas: &[&str]) -> DatabaseConfig {
    let mut primary = NodeConfig::from_url(url).expect("valid DATABASE_URL");
    primary.name = "primary".to_string();
    primary.min_connections = 0;
    let replicas = replicas
        .iter()
        .map(|name| NodeConfig {
            name: name.to_string(),
            ..primary.clone()
        })
        .collect();
    DatabaseConfig::clustered(primary, replicas)
}

async fn create_table(db: &Db, name: &str) -> String {
    let table = format!("db_cluster_it_{}_{}", name, std::process::id());
    db.exec(sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))).await.unwrap();
    db.exec(sqlx::query(&format!("CREATE TABLE {table} (id BIGINT PRIMARY KEY, label TEXT NOT NULL)")))
        .await
        .unwrap();
    table
}

async fn count(db: &Db, table: &str) -> i64 {
    let sql = format!("SELECT COUNT(*) FROM {table}");
    db.query_row(sqlx::query(&sql)).await.unwrap().get(0)
}

fn explode() -> Result<(), DbError> {
    panic!("boom")
}

#[tokio::test]
async fn test_query_and_exec() {
    let Some(url) = common::database_url() else {
        return;
    };
    let db = Db::connect(live_config(&url, &["r1"])).await.unwrap();
    db.ping().await.unwrap();
    let table = create_table(&db, "query").await;

    let sql = format!("INSERT INTO {table} (id, label) VALUES ($1, $2)");
    let result = db.exec(sqlx::query(&sql).bind(1_i64).bind("one")).await.unwrap();
    assert_eq!(result.rows_affected(), 1);

    let sql = format!("SELECT label FROM {table} WHERE id = $1");
    let row = db.fetch_optional(sqlx::query(&sql).bind(1_i64)).await.unwrap().unwrap();
    assert_eq!(row.get::<String, _>("label"), "one");
    assert!(db.fetch_optional(sqlx::query(&sql).bind(2_i64)).await.unwrap().is_none());

    let rows = db.query(sqlx::query(&format!("SELECT id FROM {table}"))).await.unwrap();
    assert_eq!(rows.len(), 1);

    let err = db.query(sqlx::query("SELECT * FROM no_such_table_anywhere")).await.unwrap_err();
    assert!(matches!(err, DbError::Query(_)));

    db.exec(sqlx::query(&format!("DROP TABLE {table}"))).await.unwrap();
    db.close().await;
}

#[tokio::test]
async fn test_batch_is_atomic() {
    let Some(url) = common::database_url() else {
        return;
    };
    let db = Db::connect(live_config(&url, &[])).await.unwrap();
    let table = create_table(&db, "batch").await;

    let ok = [
        format!("INSERT INTO {table} VALUES (1, 'a')"),
        format!("INSERT INTO {table} VALUES (2, 'b')"),
    ];
    let results = db.send_batch(ok.iter().map(|s| sqlx::query(s)).collect()).await.unwrap();
    assert_eq!(results.len(), 2);

    // The duplicate key fails the second statement, so the first is undone too
    let failing = [
        format!("INSERT INTO {table} VALUES (3, 'c')"),
        format!("INSERT INTO {table} VALUES (1, 'dup')"),
    ];
    let err = db.send_batch(failing.iter().map(|s| sqlx::query(s)).collect()).await.unwrap_err();
    assert!(matches!(err, DbError::Query(_)));
    assert_eq!(count(&db, &table).await, 2);

    db.exec(sqlx::query(&format!("DROP TABLE {table}"))).await.unwrap();
    db.close().await;
}

#[tokio::test]
async fn test_transaction_commit_and_rollback() {
    let Some(url) = common::database_url() else {
        return;
    };
    let db = Db::connect(live_config(&url, &["r1"])).await.unwrap();
    let table = create_table(&db, "tx").await;

    let sql = format!("INSERT INTO {table} VALUES (1, 'kept')");
    let id: i64 = db
        .transaction(|tx| {
            async move {
                sqlx::query(&sql).execute(&mut **tx).await?;
                Ok::<_, DbError>(1)
            }
            .boxed()
        })
        .await
        .unwrap();
    assert_eq!(id, 1);
    assert_eq!(count(&db, &table).await, 1);

    let sql = format!("INSERT INTO {table} VALUES (2, 'discarded')");
    let err = db
        .transaction(|tx| {
            async move {
                sqlx::query(&sql).execute(&mut **tx).await?;
                Err::<(), _>(DbError::Timeout(10))
            }
            .boxed()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Timeout(10)));
    assert_eq!(count(&db, &table).await, 1);

    db.exec(sqlx::query(&format!("DROP TABLE {table}"))).await.unwrap();
    db.close().await;
}

#[tokio::test]
async fn test_transaction_panic_rolls_back() {
    let Some(url) = common::database_url() else {
        return;
    };
    let db = Db::connect(live_config(&url, &[])).await.unwrap();
    let table = create_table(&db, "panic").await;

    let handle = db.clone();
    let sql = format!("INSERT INTO {table} VALUES (1, 'lost')");
    let joined = tokio::spawn(async move {
        handle
            .transaction(|tx| {
                async move {
                    sqlx::query(&sql).execute(&mut **tx).await?;
                    explode()
                }
                .boxed()
            })
            .await
    })
    .await;

    // The panic reaches the caller after the rollback
    assert!(joined.unwrap_err().is_panic());
    assert_eq!(count(&db, &table).await, 0);
    // The connection went back to the pool in a usable state
    db.ping().await.unwrap();

    db.exec(sqlx::query(&format!("DROP TABLE {table}"))).await.unwrap();
    db.close().await;
}

#[tokio::test]
async fn test_least_connections_uses_pool_stats() {
    let Some(url) = common::database_url() else {
        return;
    };
    let mut config = live_config(&url, &["r1", "r2"]);
    config.load_balance_policy = "least_conn".to_string();
    let db = Db::connect(config).await.unwrap();
    let cluster = db.cluster().unwrap().clone();

    assert_eq!(cluster.replica().unwrap().name(), "r1");

    let r1 = cluster.all_replicas().remove(0);
    let held = r1.pool().acquire().await.unwrap();
    assert_eq!(r1.active_connections(), 1);
    assert_eq!(cluster.replica().unwrap().name(), "r2");

    drop(held);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(cluster.replica().unwrap().name(), "r1");

    db.close().await;
}

#[tokio::test]
async fn test_slow_queries_are_recorded() {
    let Some(url) = common::database_url() else {
        return;
    };
    let mut config = live_config(&url, &[]);
    config.slow_query.threshold_ms = 20;
    config.slow_query.max_statement_len = 10;
    let db = Db::connect(config).await.unwrap();

    db.query(sqlx::query("SELECT 1")).await.unwrap();
    db.query(sqlx::query("SELECT 1 FROM pg_sleep(0.1)")).await.unwrap();

    let slow = db.slow_queries();
    assert_eq!(slow.len(), 1);
    assert_eq!(slow[0].op, "query");
    assert_eq!(slow[0].statement, "SELECT 1 F...");

    db.close().await;
}

#[tokio::test]
async fn test_primary_preferred_uses_live_primary() {
    let Some(url) = common::database_url() else {
        return;
    };
    let mut config = live_config(&url, &["r1"]);
    config.read_policy = "master_first".to_string();
    let db = Db::connect(config.clone()).await.unwrap();
    let cluster = db.cluster().unwrap().clone();

    let router = Router::new(
        cluster.clone(),
        config.read_policy().unwrap(),
        config.health_check.primary_probe_timeout(),
        Span::none(),
    );
    assert_eq!(router.policy(), ReadPolicy::PrimaryPreferred);
    let route = router.route_read().await.unwrap();
    assert!(route.is_primary());
    assert!(matches!(route.target(), Target::Primary));

    // Replica health does not matter while the primary answers
    for replica in cluster.all_replicas() {
        cluster.mark_unhealthy(&replica);
    }
    assert!(router.route_read().await.unwrap().is_primary());

    // The facade reads through the same policy
    let row = db.query_row(sqlx::query("SELECT 1::BIGINT")).await.unwrap();
    assert_eq!(row.get::<i64, _>(0), 1);

    db.close().await;
}
