//! Bounded retry with exponential backoff for transient I/O failures.
//!
//! Only errors the caller classifies as transient are retried; validation
//! and authentication failures propagate immediately.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

/// Retry budget for one logical I/O operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay before the second attempt; doubles each retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

/// Run an operation under a retry policy.
///
/// `is_transient` decides, per error, whether another attempt is allowed.
pub async fn retry_transient<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut op: F,
    is_transient: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.attempts && is_transient(&err) => {
                let delay = policy.base_delay * 2u32.saturating_pow(attempt - 1);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, backing off"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
