// Fixed-attempt retry with a constant pause between attempts
// Author: kelexine (https://github.com/kelexine)

use backoff::backoff::{Backoff, Constant};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero behaves like one.
    pub max_attempts: u32,
    /// Pause before every attempt after the first.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }

    /// Upstream is slow rather than overloaded, so the pause never grows
    pub fn backoff(&self) -> Constant {
        Constant::new(self.delay)
    }
}

/// Execute `operation` until it succeeds or the attempt budget is spent.
///
/// The closure receives the 1-based attempt number. On exhaustion the error
/// from the last attempt is returned unchanged, so callers can tell apart
/// the ways the final attempt failed.
pub async fn with_retry<F, Fut, T, E>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut backoff = policy.backoff();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", operation_name, attempt);
                }
                return Ok(result);
            }
            Err(e) => {
                if attempt >= max_attempts {
                    warn!(
                        "{} failed on final attempt {}/{}: {}",
                        operation_name, attempt, max_attempts, e
                    );
                    return Err(e);
                }

                let delay = backoff.next_backoff().unwrap_or(policy.delay);
                debug!(
                    "{} failed (attempt {}/{}): {}, retrying after {}ms",
                    operation_name,
                    attempt,
                    max_attempts,
                    e,
                    delay.as_millis()
                );

                // Wait before retry
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_budget_with_constant_delay() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<(), String> = with_retry(
            "always fails",
            &RetryPolicy::new(3, Duration::from_secs(2)),
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("boom {}", attempt)) }
            },
        )
        .await;

        assert_eq!(result.unwrap_err(), "boom 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_skips_delay() {
        let start = Instant::now();
        let result: Result<u32, String> =
            with_retry("ok", &RetryPolicy::new(2, Duration::from_secs(2)), |attempt| async move {
                Ok(attempt)
            })
            .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_still_runs_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = with_retry("once", &RetryPolicy::new(0, Duration::ZERO), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("nope") }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
