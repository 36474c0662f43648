//! db-cluster (v1)
//!
//! Operator CLI for a primary/replica Postgres topology.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────┐
//!   caller ──────▶│  Db facade ──▶ Router ──▶ LoadBalancer       │
//!                 │     │            │             │              │
//!                 │     │            ▼             ▼              │
//!                 │     │        primary pool   replica pools     │
//!                 │     │                          ▲              │
//!                 │     └── slow log        health monitor ───────┘
//!                 │                                               │
//!                 │  config · observability · resilience · lifecycle
//!                 └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use db_cluster::config::{load_config, loader::config_from_env, DatabaseConfig};
use db_cluster::observability::{logging, metrics};
use db_cluster::Db;

#[derive(Parser)]
#[command(name = "db-cluster")]
#[command(about = "Inspect and exercise a primary/replica database cluster", long_about = None)]
struct Cli {
    /// TOML config file. Without it the config comes from DB_* variables.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and exit
    Check,
    /// Connect and ping the primary
    Ping,
    /// Run one health pass and print cluster status as JSON
    Status,
    /// Keep the cluster open with health checks and metrics until Ctrl+C
    Serve,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => config_from_env()?,
    };

    if let Err(e) = logging::init(&config.observability) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match cli.command {
        Commands::Check => {
            describe(&config);
            println!("configuration ok");
        }
        Commands::Ping => {
            let db = Db::connect(config).await?;
            let result = db.ping().await;
            db.close().await;
            result?;
            println!("pong");
        }
        Commands::Status => {
            let primary = config.primary.display_name();
            let db = Db::connect(config).await?;
            let status = match db.cluster() {
                Some(cluster) => {
                    cluster.check_replicas().await;
                    serde_json::to_value(cluster.status())?
                }
                None => {
                    db.ping().await?;
                    serde_json::json!({
                        "primary": primary,
                        "replicas": [],
                    })
                }
            };
            db.close().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Serve => {
            if config.observability.metrics_enabled {
                if let Ok(addr) = config.observability.metrics_address.parse() {
                    metrics::init_metrics(addr);
                } else {
                    tracing::error!(
                        metrics_address = %config.observability.metrics_address,
                        "Failed to parse metrics address"
                    );
                }
            }

            describe(&config);
            let db = Db::connect(config).await?;
            tracing::info!("Cluster ready, press Ctrl+C to stop");

            tokio::signal::ctrl_c().await?;
            tracing::info!("Shutdown signal received");
            db.close().await;
            tracing::info!("Shutdown complete");
        }
    }

    Ok(())
}

fn describe(config: &DatabaseConfig) {
    tracing::info!(
        primary = %config.primary.display_name(),
        replicas = config.replicas.len(),
        read_policy = %config.read_policy,
        load_balance_policy = %config.load_balance_policy,
        health_checks = config.health_check.enabled,
        "Configuration loaded"
    );
}
