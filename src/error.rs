//! Error definitions for the data-access layer.

use thiserror::Error;

use crate::config::validation::ValidationError;

/// Errors surfaced by the cluster, router and database facade.
#[derive(Debug, Error)]
pub enum DbError {
    /// Configuration was rejected before any pool was opened.
    #[error("invalid configuration: {}", join_errors(.0))]
    Config(Vec<ValidationError>),

    /// A pool could not be created or failed its first ping.
    #[error("failed to connect to {node}: {source}")]
    Connect {
        node: String,
        #[source]
        source: sqlx::Error,
    },

    /// Every configured replica is currently marked unhealthy (or none exist).
    #[error("no healthy replicas available")]
    NoHealthyReplica,

    /// The underlying engine rejected or failed the statement.
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    /// Begin, commit or rollback failed.
    #[error("transaction failed: {0}")]
    Transaction(#[source] sqlx::Error),

    /// A bounded operation did not finish in time.
    #[error("operation timed out after {0} ms")]
    Timeout(u64),

    /// The facade has already been closed.
    #[error("database handle is closed")]
    Closed,
}

impl DbError {
    /// True when the caller may retry explicitly against the primary.
    pub fn is_no_replica(&self) -> bool {
        matches!(self, DbError::NoHealthyReplica)
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for data-access operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::NoHealthyReplica;
        assert_eq!(err.to_string(), "no healthy replicas available");
        assert!(err.is_no_replica());

        let err = DbError::Config(vec![
            ValidationError::new("primary.host", "must not be empty"),
            ValidationError::new("primary.port", "must be between 1 and 65535"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("primary.host"));
        assert!(msg.contains("primary.port"));
        assert!(!err.is_no_replica());
    }

    #[test]
    fn test_timeout_display() {
        assert_eq!(DbError::Timeout(3000).to_string(), "operation timed out after 3000 ms");
    }
}
