//! Timeout enforcement.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from the call's own errors
//! - Dropping the inner future on expiry cancels the call cleanly

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Outcome of a deadline-bounded call that did not succeed.
#[derive(Debug, Error)]
pub enum Deadline<E> {
    #[error("timed out after {0:?}")]
    Elapsed(Duration),

    #[error(transparent)]
    Failed(E),
}

/// Await `fut` for at most `limit`.
pub async fn with_deadline<T, E, F>(limit: Duration, fut: F) -> Result<T, Deadline<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(Deadline::Failed(e)),
        Err(_) => Err(Deadline::Elapsed(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_in_time() {
        let result: Result<u8, Deadline<()>> =
            with_deadline(Duration::from_secs(1), async { Ok(3) }).await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: Result<u8, Deadline<&str>> =
            with_deadline(Duration::from_secs(1), async { Err("boom") }).await;
        assert!(matches!(result, Err(Deadline::Failed("boom"))));
    }

    #[tokio::test]
    async fn test_elapsed() {
        let result: Result<u8, Deadline<()>> = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(1)
        })
        .await;
        assert!(matches!(result, Err(Deadline::Elapsed(_))));
    }
}
