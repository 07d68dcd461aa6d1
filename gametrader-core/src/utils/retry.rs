use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Backoff exponent cap (2^11 = 2048 seconds).
const MAX_BACKOFF_EXPONENT: u32 = 11;

/// Calculate the next retry delay based on retry count.
///
/// Uses exponential backoff: 2^retry_count seconds.
pub fn calculate_retry_delay(retry_count: u32) -> Duration {
    let seconds = 2u64.pow(retry_count.min(MAX_BACKOFF_EXPONENT));
    Duration::from_secs(seconds)
}

/// Run `op` up to `attempts` times, sleeping `delay` between failures.
///
/// Used for startup connections only; business operations are never retried
/// through here.
pub async fn retry_fixed<T, E, F, Fut>(
    what: &str,
    attempts: u32,
    delay: Duration,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!(
                    target_name = what,
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "Connection attempt failed, retrying in {:?}",
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                error!(target_name = what, attempts, error = %e, "Giving up connecting");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_retry_delay_calculation() {
        assert_eq!(calculate_retry_delay(0), Duration::from_secs(1));
        assert_eq!(calculate_retry_delay(1), Duration::from_secs(2));
        assert_eq!(calculate_retry_delay(2), Duration::from_secs(4));
        assert_eq!(calculate_retry_delay(11), Duration::from_secs(2048));
        // Max capped at 11
        assert_eq!(calculate_retry_delay(12), Duration::from_secs(2048));
        assert_eq!(calculate_retry_delay(100), Duration::from_secs(2048));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_fixed_succeeds_after_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<u32, String> =
            retry_fixed("store", 5, Duration::from_secs(10), || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 { Err(format!("attempt {n}")) } else { Ok(n) }
            })
            .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_fixed_gives_up_after_budget() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let started = tokio::time::Instant::now();
        let result: Result<(), String> =
            retry_fixed("broker", 5, Duration::from_secs(5), || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("refused".to_string())
            })
            .await;
        assert_eq!(result, Err("refused".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert!(started.elapsed() >= Duration::from_secs(20));
    }
}
