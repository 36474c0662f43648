//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

/// Delay before connection attempt `attempt` (1-based retries; 0 means no wait).
///
/// Doubles from `base` per attempt, capped at `max`, plus up to 10% jitter.
pub fn retry_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 2u32.saturating_pow(attempt - 1);
    let capped = base.saturating_mul(factor).min(max);

    let jitter_ms = (capped.as_millis() / 10) as u64;
    let jitter = if jitter_ms > 0 {
        Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
    } else {
        Duration::ZERO
    };

    capped + jitter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay() {
        let base = Duration::from_millis(100);
        let max = Duration::from_millis(2000);

        assert_eq!(retry_delay(0, base, max), Duration::ZERO);

        let d1 = retry_delay(1, base, max);
        assert!(d1 >= base && d1 < Duration::from_millis(110));

        let d3 = retry_delay(3, base, max);
        assert!(d3 >= Duration::from_millis(400));

        let capped = retry_delay(12, base, Duration::from_millis(1000));
        assert!(capped >= Duration::from_millis(1000));
        assert!(capped < Duration::from_millis(1100));
    }
}
