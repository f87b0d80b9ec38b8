use std::time::Duration;

use tokio::time::sleep;
use tokio::time::timeout;
use tracing::warn;

use crate::BackoffPolicy;
use crate::RemoteError;
use crate::Result;

/// Runs `task` under `policy`: each attempt is bounded by the policy
/// timeout, failed attempts back off exponentially up to the policy cap.
/// Non-retryable errors abort immediately; the retryable predicate is
/// [`crate::Error::is_retryable`].
pub(crate) async fn retry_with_backoff<F, T, P>(
    task: F,
    policy: &BackoffPolicy,
) -> Result<P>
where
    F: Fn() -> T,                               // The type of the async function
    T: std::future::Future<Output = Result<P>>, // The future returned by the async function
{
    let max_attempts = policy.max_retries.max(1);
    let timeout_duration = Duration::from_millis(policy.timeout_ms);
    let max_delay = Duration::from_millis(policy.max_delay_ms);
    let mut delay = Duration::from_millis(policy.base_delay_ms);
    let mut attempts = 0;

    loop {
        match timeout(timeout_duration, task()).await {
            Ok(Ok(r)) => {
                return Ok(r); // Exit on success
            }
            Ok(Err(error)) => {
                if !error.is_retryable() {
                    return Err(error);
                }
                warn!("attempt failed with retryable error: {:?}", &error);
            }
            Err(elapsed) => {
                warn!("attempt timed out: {:?}", &elapsed);
            }
        };

        attempts += 1;
        if attempts >= max_attempts {
            warn!("task failed after {} attempts", attempts);
            return Err(RemoteError::RetriesExhausted { attempts }.into());
        }
        sleep(delay).await;
        delay = (delay * 2).min(max_delay); // Exponential backoff (double the delay each
                                            // time)
    }
}
