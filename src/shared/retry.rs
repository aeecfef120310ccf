//! Retry with exponential backoff
//!
//! Generic retry helper for transient failures. The allocator runs each
//! store commit through it so contention (a locked database) is retried a
//! bounded number of times. Delays are jittered so racers that failed
//! together do not wake up together.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first one).
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub backoff_multiplier: f64,
    /// Maximum delay between retries (cap).
    pub max_delay: Duration,
    /// Share of each delay drawn at random, from 0.0 (none) to 1.0 (all).
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(10),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_millis(200),
            jitter: 0.5,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based), capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let secs = (self.initial_delay.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    /// `delay_for` with the jittered share replaced by a uniform draw.
    pub fn jittered_delay_for(&self, attempt: u32) -> Duration {
        let base = self.delay_for(attempt).as_secs_f64();
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 || base == 0.0 {
            return Duration::from_secs_f64(base);
        }
        let fixed = base * (1.0 - jitter);
        let random = rand::thread_rng().gen_range(0.0..=base * jitter);
        Duration::from_secs_f64(fixed + random)
    }
}

/// Execute an async operation with exponential backoff retry.
///
/// The `should_retry` closure determines whether a given error is transient
/// (and therefore retryable) or permanent (bail immediately). When every
/// attempt fails the last error is returned unchanged; callers decide how to
/// surface exhaustion.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
    should_retry: impl Fn(&E) -> bool,
    operation_name: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(operation = operation_name, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if !should_retry(&err) {
                    return Err(err);
                }
                if attempt >= max_attempts {
                    warn!(
                        operation = operation_name,
                        attempt,
                        max_attempts,
                        error = %err,
                        "Retries exhausted"
                    );
                    return Err(err);
                }

                let delay = config.jittered_delay_for(attempt);
                debug!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    error = %err,
                    retry_in_ms = delay.as_millis() as u64,
                    "Transient failure, retrying"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_millis(2),
            jitter: 0.5,
        }
    }

    #[test]
    fn delay_grows_and_is_capped() {
        let cfg = RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_millis(10),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_millis(50),
            jitter: 0.0,
        };
        assert_eq!(cfg.delay_for(1), Duration::from_millis(10));
        assert_eq!(cfg.delay_for(2), Duration::from_millis(20));
        assert_eq!(cfg.delay_for(3), Duration::from_millis(40));
        assert_eq!(cfg.delay_for(4), Duration::from_millis(50));
        assert_eq!(cfg.jittered_delay_for(2), Duration::from_millis(20));
    }

    #[test]
    fn jitter_stays_within_delay_band() {
        let cfg = RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_millis(40),
            backoff_multiplier: 1.0,
            max_delay: Duration::from_millis(40),
            jitter: 0.5,
        };
        let draws: Vec<Duration> = (0..200).map(|_| cfg.jittered_delay_for(1)).collect();
        assert!(draws
            .iter()
            .all(|d| *d >= Duration::from_millis(20) && *d <= Duration::from_millis(40)));
        assert!(draws.iter().any(|d| *d != draws[0]));
    }

    #[tokio::test]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry_with_backoff(
            &fast(),
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err("busy".to_string())
                } else {
                    Ok(n)
                }
            },
            |_| true,
            "test",
        )
        .await;
        assert_eq!(result, Ok(3));
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = retry_with_backoff(
            &fast(),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("fatal".to_string())
            },
            |_| false,
            "test",
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = retry_with_backoff(
            &fast(),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("busy".to_string())
            },
            |_| true,
            "test",
        )
        .await;
        assert_eq!(result, Err("busy".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
