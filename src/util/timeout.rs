//! Timeout helper.

use std::future::Future;
use std::time::Duration;

/// Run a future under an optional deadline.
///
/// `None` waits indefinitely. On expiry the elapsed deadline is returned as
/// the error so callers can report it in their own error type.
pub async fn with_deadline<F>(deadline: Option<Duration>, future: F) -> Result<F::Output, Duration>
where
    F: Future,
{
    match deadline {
        Some(duration) => tokio::time::timeout(duration, future)
            .await
            .map_err(|_| duration),
        None => Ok(future.await),
    }
}
