//! Cancellation utilities for interruptible actor operations
//!
//! Provides helpers for racing futures against cancellation flags,
//! enabling responsive operation interruption. Cancellation is cooperative:
//! long-running tasks check the flag at each poll iteration.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default poll interval for cancellation checks (50ms)
pub const DEFAULT_CANCEL_POLL_MS: u64 = 50;

/// Shared cancel flag; clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Completes once the flag is set, checking every `poll_interval_ms`
    pub async fn cancelled(&self, poll_interval_ms: u64) {
        loop {
            if self.is_cancelled() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(poll_interval_ms.max(1))).await;
        }
    }
}

/// Races a future against cancellation, returns None if cancelled
///
/// The flag is checked every `poll_interval_ms`.
///
/// # Example
/// ```ignore
/// match race_with_cancellation(transport.request_permission(&device), flag.clone(), 50).await {
///     Some(Permission::Granted) => open(),
///     Some(Permission::Denied) => report_denied(),
///     None => {} // close() won
/// }
/// ```
pub async fn race_with_cancellation<T, F>(
    fut: F,
    cancel_flag: CancelFlag,
    poll_interval_ms: u64,
) -> Option<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel_flag.cancelled(poll_interval_ms) => None,
        result = fut => Some(result),
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_future_completes_when_flag_set() {
        let flag = CancelFlag::new();
        let waiter = {
            let flag = flag.clone();
            tokio::spawn(async move { flag.cancelled(10).await })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!waiter.is_finished());
        flag.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_race_returns_none_when_cancelled() {
        let flag = CancelFlag::new();
        flag.cancel();

        let result = race_with_cancellation(
            async { tokio::time::sleep(Duration::from_secs(10)).await },
            flag,
            DEFAULT_CANCEL_POLL_MS,
        )
        .await;

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_race_returns_value_when_not_cancelled() {
        let result = race_with_cancellation(async { 7 }, CancelFlag::new(), 10).await;
        assert_eq!(result, Some(7));
    }
}
