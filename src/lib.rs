//! Relational database client with primary/replica routing.

pub mod cluster;
pub mod config;
pub mod db;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod resilience;
pub mod routing;

pub use cluster::Cluster;
pub use config::schema::DatabaseConfig;
pub use db::Db;
pub use error::{DbError, DbResult};
pub use lifecycle::Shutdown;
