//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{DatabaseConfig, NodeConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load a TOML file, apply `DB_*` environment overrides, then validate.
pub fn load_config(path: &Path) -> Result<DatabaseConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config = parse_config(&content)?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&mut config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build a config from the environment alone, on top of defaults.
pub fn config_from_env() -> Result<DatabaseConfig, ConfigError> {
    let mut config = DatabaseConfig::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&mut config).map_err(ConfigError::Validation)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<DatabaseConfig, ConfigError> {
    toml::from_str(content).map_err(ConfigError::Parse)
}

/// Apply overrides from `lookup` (normally the process environment).
///
/// `DB_REPLICA_HOSTS` replaces the replica list with `host[:port]` entries
/// that inherit the primary's database, credentials and pool settings.
pub fn apply_env_overrides<F>(config: &mut DatabaseConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let primary = &mut config.primary;
    if let Some(host) = lookup("DB_HOST") {
        primary.host = host;
    }
    if let Some(port) = lookup("DB_PORT") {
        match port.parse() {
            Ok(port) => primary.port = port,
            Err(_) => tracing::warn!(value = %port, "Ignoring non-numeric DB_PORT"),
        }
    }
    if let Some(database) = lookup("DB_NAME") {
        primary.database = database;
    }
    if let Some(user) = lookup("DB_USER") {
        primary.user = user;
    }
    if let Some(password) = lookup("DB_PASSWORD") {
        primary.password = password;
    }
    if let Some(ssl_mode) = lookup("DB_SSLMODE") {
        primary.ssl_mode = ssl_mode;
    }
    if let Some(policy) = lookup("DB_READ_POLICY") {
        config.read_policy = policy;
    }
    if let Some(policy) = lookup("DB_LOAD_BALANCE_POLICY") {
        config.load_balance_policy = policy;
    }
    if let Some(hosts) = lookup("DB_REPLICA_HOSTS") {
        config.replicas = hosts
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(|entry| replica_from_primary(&config.primary, entry))
            .collect();
    }
}

fn replica_from_primary(primary: &NodeConfig, entry: &str) -> NodeConfig {
    let (host, port) = match entry.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host, port),
            // Leave the bad port for validation to report.
            Err(_) => (host, 0),
        },
        None => (entry, primary.port),
    };
    NodeConfig {
        name: String::new(),
        host: host.to_string(),
        port,
        weight: 1,
        ..primary.clone()
    }
}
