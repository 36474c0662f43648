//! Database facade.
//!
//! # Data Flow
//! ```text
//! Db::query ──▶ Router::route_statement ──▶ replica or primary pool
//! Db::exec / begin / transaction ──▶ primary pool
//!        └──▶ SlowLog + metrics on every completed operation
//! ```

pub mod facade;
pub mod slowlog;

pub use facade::{Db, PgTransaction};
pub use slowlog::{SlowLog, SlowQueryEntry};
