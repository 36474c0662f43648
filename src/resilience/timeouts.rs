//! Timeout enforcement.

use std::future::Future;
use std::time::Duration;

use crate::error::{DbError, DbResult};

/// Run `fut` with a deadline, mapping expiry to [`DbError::Timeout`].
pub async fn bounded<T, F>(limit: Duration, fut: F) -> DbResult<T>
where
    F: Future<Output = DbResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(DbError::Timeout(limit.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_expires() {
        let result: DbResult<()> = bounded(Duration::from_millis(20), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(DbError::Timeout(20))));
    }

    #[tokio::test]
    async fn test_bounded_passes_through() {
        let ok = bounded(Duration::from_secs(1), async { Ok(7) }).await.unwrap();
        assert_eq!(ok, 7);

        let err: DbResult<()> = bounded(Duration::from_secs(1), async { Err(DbError::NoHealthyReplica) }).await;
        assert!(err.unwrap_err().is_no_replica());
    }
}
