//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports, pool bounds, intervals)
//! - Check topology rules (replica-only reads need replicas)
//! - Normalize non-positive replica weights to 1
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Every error names the offending field path
//! - Runs before any pool is opened

use std::fmt;
use std::str::FromStr;

use sqlx::postgres::PgSslMode;

use crate::config::schema::{DatabaseConfig, NodeConfig, ReadPolicy};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `replicas[1].port`.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate the configuration, normalizing weights in place.
pub fn validate_config(config: &mut DatabaseConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_node("primary", &mut config.primary, &mut errors);
    for (i, replica) in config.replicas.iter_mut().enumerate() {
        validate_node(&format!("replicas[{}]", i), replica, &mut errors);
    }

    match config.read_policy() {
        Ok(ReadPolicy::AlwaysReplica) if config.replicas.is_empty() => {
            errors.push(ValidationError::new(
                "read_policy",
                "'slave' requires at least one configured replica",
            ));
        }
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::new("read_policy", e.to_string())),
    }

    if let Err(e) = config.load_balance_policy() {
        errors.push(ValidationError::new("load_balance_policy", e.to_string()));
    }

    let health = &config.health_check;
    if health.enabled {
        if health.interval_secs == 0 {
            errors.push(ValidationError::new("health_check.interval_secs", "must be greater than 0"));
        }
        if health.timeout_secs == 0 {
            errors.push(ValidationError::new("health_check.timeout_secs", "must be greater than 0"));
        }
    }
    if health.primary_probe_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "health_check.primary_probe_timeout_secs",
            "must be greater than 0",
        ));
    }

    if config.failover.failure_threshold == 0 {
        errors.push(ValidationError::new("failover.failure_threshold", "must be at least 1"));
    }
    if config.failover.recovery_threshold == 0 {
        errors.push(ValidationError::new("failover.recovery_threshold", "must be at least 1"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_node(prefix: &str, node: &mut NodeConfig, errors: &mut Vec<ValidationError>) {
    let field = |name: &str| format!("{}.{}", prefix, name);

    if node.host.trim().is_empty() {
        errors.push(ValidationError::new(field("host"), "must not be empty"));
    }
    if !(1..=65535).contains(&node.port) {
        errors.push(ValidationError::new(
            field("port"),
            format!("must be between 1 and 65535, got {}", node.port),
        ));
    }
    if node.database.trim().is_empty() {
        errors.push(ValidationError::new(field("database"), "must not be empty"));
    }
    if node.user.trim().is_empty() {
        errors.push(ValidationError::new(field("user"), "must not be empty"));
    }
    if node.max_connections == 0 {
        errors.push(ValidationError::new(field("max_connections"), "must be greater than 0"));
    }
    if node.min_connections > node.max_connections {
        errors.push(ValidationError::new(
            field("min_connections"),
            format!(
                "must not exceed max_connections ({} > {})",
                node.min_connections, node.max_connections
            ),
        ));
    }
    if PgSslMode::from_str(&node.ssl_mode).is_err() {
        errors.push(ValidationError::new(
            field("ssl_mode"),
            format!("unknown SSL mode '{}'", node.ssl_mode),
        ));
    }

    if node.weight <= 0 {
        tracing::debug!(node = %node.display_name(), weight = node.weight, "Normalizing non-positive weight to 1");
        node.weight = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(host: &str) -> NodeConfig {
        NodeConfig {
            host: host.to_string(),
            database: "app".to_string(),
            user: "app".to_string(),
            ..NodeConfig::default()
        }
    }

    fn fields(errors: &[ValidationError]) -> Vec<&str> {
        errors.iter().map(|e| e.field.as_str()).collect()
    }

    #[test]
    fn test_valid_configs() {
        let mut standalone = DatabaseConfig::standalone(node("db"));
        assert!(validate_config(&mut standalone).is_ok());

        let mut clustered = DatabaseConfig::clustered(node("db"), vec![node("r1"), node("r2")]);
        clustered.read_policy = "slave".to_string();
        clustered.load_balance_policy = "weighted".to_string();
        assert!(validate_config(&mut clustered).is_ok());
    }

    #[test]
    fn test_missing_host() {
        let mut config = DatabaseConfig::standalone(node(""));
        let errors = validate_config(&mut config).unwrap_err();
        assert_eq!(fields(&errors), vec!["primary.host"]);
    }

    #[test]
    fn test_missing_database_and_user() {
        let mut config = DatabaseConfig::standalone(NodeConfig::default());
        let errors = validate_config(&mut config).unwrap_err();
        assert!(fields(&errors).contains(&"primary.database"));
        assert!(fields(&errors).contains(&"primary.user"));
    }

    #[test]
    fn test_invalid_ports() {
        for port in [0, -5, 70000] {
            let mut primary = node("db");
            primary.port = port;
            let mut config = DatabaseConfig::standalone(primary);
            let errors = validate_config(&mut config).unwrap_err();
            assert_eq!(fields(&errors), vec!["primary.port"], "port {}", port);
        }
    }

    #[test]
    fn test_min_exceeds_max() {
        let mut replica = node("r1");
        replica.min_connections = 10;
        replica.max_connections = 5;
        let mut config = DatabaseConfig::clustered(node("db"), vec![node("r0"), replica]);
        let errors = validate_config(&mut config).unwrap_err();
        assert_eq!(fields(&errors), vec!["replicas[1].min_connections"]);
        assert!(errors[0].message.contains("10 > 5"));
    }

    #[test]
    fn test_unknown_policies() {
        let mut config = DatabaseConfig::standalone(node("db"));
        config.read_policy = "nearest".to_string();
        config.load_balance_policy = "fastest".to_string();
        let errors = validate_config(&mut config).unwrap_err();
        assert_eq!(fields(&errors), vec!["read_policy", "load_balance_policy"]);
        assert!(errors[0].message.contains("nearest"));
    }

    #[test]
    fn test_replica_policy_requires_replicas() {
        let mut config = DatabaseConfig::standalone(node("db"));
        config.read_policy = "slave".to_string();
        let errors = validate_config(&mut config).unwrap_err();
        assert_eq!(fields(&errors), vec!["read_policy"]);
    }

    #[test]
    fn test_collects_all_errors() {
        let mut primary = node("");
        primary.port = 0;
        let mut config = DatabaseConfig::standalone(primary);
        config.health_check.interval_secs = 0;
        config.failover.failure_threshold = 0;
        let errors = validate_config(&mut config).unwrap_err();
        assert_eq!(
            fields(&errors),
            vec!["primary.host", "primary.port", "health_check.interval_secs", "failover.failure_threshold"]
        );
    }

    #[test]
    fn test_weight_normalized_not_rejected() {
        let mut zero = node("r1");
        zero.weight = 0;
        let mut negative = node("r2");
        negative.weight = -4;
        let mut config = DatabaseConfig::clustered(node("db"), vec![zero, negative]);
        assert!(validate_config(&mut config).is_ok());
        assert_eq!(config.replicas[0].weight, 1);
        assert_eq!(config.replicas[1].weight, 1);
    }

    #[test]
    fn test_bad_ssl_mode() {
        let mut primary = node("db");
        primary.ssl_mode = "sometimes".to_string();
        let mut config = DatabaseConfig::standalone(primary);
        let errors = validate_config(&mut config).unwrap_err();
        assert_eq!(fields(&errors), vec!["primary.ssl_mode"]);
    }
}
