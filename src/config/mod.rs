//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → DB_* environment overrides
//!     → validation.rs (semantic checks, weight normalization)
//!     → DatabaseConfig (validated, immutable)
//!     → handed to cluster / router / db facade
//! ```
//!
//! # Design Decisions
//! - Config is immutable once validated; replica membership is static
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Policy names stay strings until validation so bad values are reported
//!   with their field name

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    DatabaseConfig, FailoverConfig, HealthCheckConfig, LoadBalancePolicy, NodeConfig,
    ObservabilityConfig, ReadPolicy, SlowQueryConfig,
};
pub use validation::{validate_config, ValidationError};
