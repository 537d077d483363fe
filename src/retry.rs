//! Bounded retry for transient connectivity failures.

use std::future::Future;
use std::time::Duration;

use crate::errors::{Error, Result};

/// Default attempt count, matching long-running deploy workflows where a
/// blip should not abort the batch.
pub const DEFAULT_ATTEMPTS: u32 = 3;
/// Default base backoff; doubled on every further attempt.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Retry `op` with the default policy. See [`retry_with`].
pub async fn retry<T, F, Fut>(op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_with(op, DEFAULT_ATTEMPTS, DEFAULT_BACKOFF).await
}

/// Run `op` up to `attempts` times, sleeping `base_backoff * 2^(n-1)` before
/// attempt `n`.
///
/// Only [`Error::Connection`] is retried; every other kind indicates a
/// genuine rejection and propagates immediately. The backoff sleep is a
/// plain `tokio::time::sleep`, so cancelling the enclosing task aborts the
/// wrapped operation instead of surfacing as a connection error.
pub async fn retry_with<T, F, Fut>(mut op: F, attempts: u32, base_backoff: Duration) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last: Option<Error> = None;

    for attempt in 0..attempts {
        if attempt > 0 {
            let backoff = base_backoff * (1 << (attempt - 1).min(5));
            tokio::time::sleep(backoff).await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => {
                tracing::debug!(attempt, error = %err, "retrying after connection failure");
                last = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    Err(last.unwrap_or(Error::Connection {
        message: "no attempts were made".to_string(),
    }))
}
