//! Connection retry logic.
//!
//! # Responsibilities
//! - Re-attempt pool creation when a node is briefly unreachable at startup
//! - Space attempts with jittered exponential backoff
//!
//! # Design Decisions
//! - Only connectivity is retried; query failures always reach the caller
//! - The last error is returned once attempts are exhausted

use std::future::Future;
use std::time::Duration;

use crate::config::FailoverConfig;
use crate::resilience::backoff::retry_delay;

/// Upper bound on a single backoff delay.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Call `attempt` up to `1 + max_retries` times until it succeeds.
pub async fn retry_connect<T, E, F, Fut>(node: &str, policy: &FailoverConfig, mut attempt: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let base = Duration::from_millis(policy.retry_interval_ms);
    let mut tries = 0;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if tries < policy.max_retries => {
                tries += 1;
                let delay = retry_delay(tries, base, MAX_RETRY_DELAY);
                tracing::warn!(node = %node, attempt = tries, delay = ?delay, error = %e, "Connection failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
