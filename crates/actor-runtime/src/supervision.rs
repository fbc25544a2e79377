/// Supervision utilities for actor operations
///
/// Delayed self-messages (such as the settle delay before a reconnect) that
/// can be called off before they fire.
use futures_channel::mpsc;
use std::time::Duration;

use crate::cancellation::CancelFlag;

/// Handle to cancel a delayed message
///
/// When dropped or explicitly cancelled, the timer task will not send its
/// message, preventing spurious wakeups after the operation is abandoned.
pub struct TimeoutHandle {
    cancelled: CancelFlag,
}

impl TimeoutHandle {
    fn new() -> Self {
        Self {
            cancelled: CancelFlag::new(),
        }
    }

    /// Cancel the timer, preventing it from firing
    pub fn cancel(&self) {
        self.cancelled.cancel();
    }
}

impl Drop for TimeoutHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Send `msg` to `tx` after `delay_ms`, unless the returned handle is
/// cancelled or dropped first.
pub fn spawn_delayed<M>(tx: mpsc::Sender<M>, msg: M, delay_ms: u64) -> TimeoutHandle
where
    M: Send + 'static,
{
    let handle = TimeoutHandle::new();
    let cancel_flag = handle.cancelled.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;

        // Final check before sending
        if !cancel_flag.is_cancelled() {
            let mut tx = tx;
            let _ = tx.try_send(msg);
        }
    });

    handle
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use futures::stream::StreamExt;

    #[tokio::test]
    async fn test_delayed_message_fires() {
        let (tx, mut rx) = mpsc::channel(100);

        // Keep handle alive so the timer can fire
        let _handle = spawn_delayed(tx, "settled", 20);

        let msg = rx.next().await.unwrap();
        assert_eq!(msg, "settled");
    }

    #[tokio::test]
    async fn test_delayed_message_cancelled_on_drop() {
        let (tx, mut rx) = mpsc::channel(100);

        {
            let _handle = spawn_delayed(tx, "settled", 20);
            // Handle dropped here
        }

        // Sender is dropped with the timer task, no message arrives
        assert_eq!(rx.next().await, None);
    }
}
