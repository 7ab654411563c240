//! Async test helpers
//!
//! Timeout wrappers for channels and futures.

use std::future::Future;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

/// Helper for receiving from a channel with a timeout
pub async fn recv_timeout<T>(
    rx: &mut mpsc::Receiver<T>,
    duration: Duration,
) -> Result<T, RecvTimeoutError> {
    timeout(duration, rx.recv())
        .await
        .map_err(|_| RecvTimeoutError::Timeout)?
        .ok_or(RecvTimeoutError::Closed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RecvTimeoutError {
    #[error("receive operation timed out")]
    Timeout,
    #[error("channel closed")]
    Closed,
}

/// Run a future with a timeout, returning Ok(result) or Err on timeout
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    timeout(duration, future)
        .await
        .map_err(|_| TimeoutError::Elapsed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TimeoutError {
    #[error("operation timed out")]
    Elapsed,
}

/// Helper to assert a future completes within duration
pub async fn assert_completes_within<F, T>(duration: Duration, future: F) -> T
where
    F: Future<Output = T>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => panic!("Future did not complete within {:?}", duration),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recv_timeout() {
        let (tx, mut rx) = mpsc::channel(1);
        tx.send(3u8).await.unwrap();
        assert_eq!(recv_timeout(&mut rx, Duration::from_millis(50)).await, Ok(3));
        assert_eq!(
            recv_timeout(&mut rx, Duration::from_millis(10)).await,
            Err(RecvTimeoutError::Timeout)
        );
        drop(tx);
        assert_eq!(
            recv_timeout(&mut rx, Duration::from_millis(10)).await,
            Err(RecvTimeoutError::Closed)
        );
    }

    #[tokio::test]
    async fn test_with_timeout() {
        assert_eq!(with_timeout(Duration::from_millis(50), async { 1 }).await, Ok(1));
        let pending = with_timeout(Duration::from_millis(10), std::future::pending::<()>()).await;
        assert_eq!(pending, Err(TimeoutError::Elapsed));
    }
}
