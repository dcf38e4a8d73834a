use std::fmt::Display;
use std::future::Future;

use tracing::{error, warn};
use waypoint_core::{CallError, RetryPolicy};

/// Errors that know whether another attempt could help.
pub trait RetryableError {
    fn is_fatal(&self) -> bool;
}

impl RetryableError for CallError {
    fn is_fatal(&self) -> bool {
        CallError::is_fatal(self)
    }
}

/// Runs `op` until it succeeds, fails fatally, or `policy.max_attempts()` is spent.
/// Transient failures wait `policy.fixed_delay()` before the next attempt.
pub async fn call_with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + Display,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 1_u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_fatal() => {
                let remaining = max_attempts.saturating_sub(attempt);
                error!(attempt, remaining, error = %err, "fatal failure, not retrying");
                return Err(err);
            }
            Err(err) => {
                let remaining = max_attempts.saturating_sub(attempt);
                warn!(attempt, remaining, error = %err, "transient failure");
                if remaining == 0 {
                    return Err(err);
                }

                tokio::time::sleep(policy.fixed_delay()).await;
                attempt += 1;
            }
        }
    }
}
