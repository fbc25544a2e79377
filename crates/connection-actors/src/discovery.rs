//! Background tasks owned by the connection actor.
//!
//! Neither task touches actor state. They report back through the
//! connection actor's inbox, tagged with the attempt id they were started
//! for, so the actor can drop results from superseded attempts.

use actor_runtime::{
    actor_debug, actor_warn, race_with_cancellation, CancelFlag, ConnectionMessage,
    DiscoveryOutcome, SessionMessage,
};
use core_types::{DeviceDescriptor, Permission, Transport};
use framing::{Framer, LineFramer};
use futures::SinkExt;
use futures_channel::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::BridgeConfig;

/// Inputs for one discovery attempt
#[derive(Debug, Clone)]
pub(crate) struct DiscoveryParams {
    pub device: DeviceDescriptor,
    pub baud_rate: u32,
    pub timeout_ms: u64,
    pub poll_ms: u64,
    pub permission_poll_ms: u64,
}

impl From<&BridgeConfig> for DiscoveryParams {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            device: config.device,
            baud_rate: config.baud_rate,
            timeout_ms: config.discovery_timeout_ms,
            poll_ms: config.discovery_poll_ms,
            permission_poll_ms: config.permission_poll_ms,
        }
    }
}

/// Poll for the device, get permission, open it.
///
/// Once `open()` has started the attempt runs to completion: an `Opened`
/// result is reported even if the flag was set meanwhile, and the actor
/// decides whether to keep or close the transport.
pub(crate) async fn discover(
    transport: Arc<dyn Transport>,
    params: DiscoveryParams,
    cancel: CancelFlag,
) -> DiscoveryOutcome {
    let deadline = Instant::now() + Duration::from_millis(params.timeout_ms);

    loop {
        if cancel.is_cancelled() {
            return DiscoveryOutcome::Cancelled;
        }
        if transport.is_device_present(&params.device).await {
            break;
        }
        if Instant::now() >= deadline {
            return DiscoveryOutcome::NotFound;
        }
        tokio::time::sleep(Duration::from_millis(params.poll_ms)).await;
    }
    actor_debug!("Device {} present", params.device);

    if !transport.has_permission(&params.device).await {
        let request = transport.request_permission(&params.device);
        match race_with_cancellation(request, cancel.clone(), params.permission_poll_ms).await {
            None => {
                actor_debug!("Permission wait for {} cancelled", params.device);
                return DiscoveryOutcome::Cancelled;
            }
            Some(Permission::Denied) => return DiscoveryOutcome::PermissionDenied,
            Some(Permission::Granted) => {}
        }
    }

    if cancel.is_cancelled() {
        return DiscoveryOutcome::Cancelled;
    }
    match transport.open(&params.device, params.baud_rate).await {
        Ok(()) => DiscoveryOutcome::Opened,
        Err(e) => DiscoveryOutcome::OpenFailed {
            reason: e.to_string(),
        },
    }
}

/// Spawn [`discover`] and post its outcome to the connection actor.
///
/// Every attempt reports, cancelled or not, so the actor knows when the
/// transport is free for the next one.
pub(crate) fn spawn_discovery(
    transport: Arc<dyn Transport>,
    params: DiscoveryParams,
    cancel: CancelFlag,
    attempt: u64,
    mut connection_tx: mpsc::Sender<ConnectionMessage>,
) {
    tokio::spawn(async move {
        let outcome = discover(transport, params, cancel).await;
        if connection_tx
            .send(ConnectionMessage::DiscoveryFinished { attempt, outcome })
            .await
            .is_err()
        {
            actor_warn!("Discovery attempt {} finished after actor stopped", attempt);
        }
    });
}

/// Read chunks, frame them into lines, hand lines to the session actor.
///
/// A fresh [`LineFramer`] per connection means no partial line survives a
/// reconnect.
pub(crate) fn spawn_reader(
    transport: Arc<dyn Transport>,
    attempt: u64,
    mut session_tx: mpsc::Sender<SessionMessage>,
    mut connection_tx: mpsc::Sender<ConnectionMessage>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut framer = LineFramer::new();
        loop {
            match transport.read_chunk().await {
                Ok(chunk) => {
                    for line in framer.push(&chunk) {
                        if session_tx.send(SessionMessage::Line(line)).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    let _ = connection_tx
                        .send(ConnectionMessage::ReadFailed {
                            attempt,
                            reason: e.to_string(),
                        })
                        .await;
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use transport_mock::{MockTransport, PermissionMode};

    fn params() -> DiscoveryParams {
        DiscoveryParams {
            device: DeviceDescriptor::FTDI_FT232,
            baud_rate: 115_200,
            timeout_ms: 200,
            poll_ms: 10,
            permission_poll_ms: 10,
        }
    }

    #[tokio::test]
    async fn test_opens_present_device() {
        let mock = MockTransport::new(DeviceDescriptor::FTDI_FT232);
        mock.set_present(true);

        let outcome = discover(Arc::new(mock.clone()), params(), CancelFlag::new()).await;
        assert_eq!(outcome, DiscoveryOutcome::Opened);
        assert!(mock.is_open());
        assert_eq!(mock.permission_requests(), 1);
    }

    #[tokio::test]
    async fn test_times_out_without_device() {
        let mock = MockTransport::new(DeviceDescriptor::FTDI_FT232);

        let outcome = discover(Arc::new(mock), params(), CancelFlag::new()).await;
        assert_eq!(outcome, DiscoveryOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_device_appearing_late_is_found() {
        let mock = MockTransport::new(DeviceDescriptor::FTDI_FT232);
        let task = tokio::spawn(discover(
            Arc::new(mock.clone()),
            params(),
            CancelFlag::new(),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        mock.set_present(true);
        assert_eq!(task.await.unwrap(), DiscoveryOutcome::Opened);
    }

    #[tokio::test]
    async fn test_permission_denied() {
        let mock = MockTransport::new(DeviceDescriptor::FTDI_FT232);
        mock.set_present(true);
        mock.set_permission_mode(PermissionMode::Deny);

        let outcome = discover(Arc::new(mock.clone()), params(), CancelFlag::new()).await;
        assert_eq!(outcome, DiscoveryOutcome::PermissionDenied);
        assert!(!mock.is_open());
    }

    #[tokio::test]
    async fn test_cancel_during_permission_wait() {
        let mock = MockTransport::new(DeviceDescriptor::FTDI_FT232);
        mock.set_present(true);
        mock.set_permission_mode(PermissionMode::Hold);

        let cancel = CancelFlag::new();
        let task = tokio::spawn(discover(Arc::new(mock.clone()), params(), cancel.clone()));

        while !mock.has_pending_permission() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();
        assert_eq!(task.await.unwrap(), DiscoveryOutcome::Cancelled);

        // A grant arriving after the cancel does not open anything.
        mock.resolve_permission(Permission::Granted);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!mock.is_open());
        assert_eq!(mock.open_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_open_still_reports_opened() {
        let mock = MockTransport::new(DeviceDescriptor::FTDI_FT232);
        mock.set_present(true);
        mock.delay_next_open(Duration::from_millis(50));

        let cancel = CancelFlag::new();
        let task = tokio::spawn(discover(Arc::new(mock.clone()), params(), cancel.clone()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();

        assert_eq!(task.await.unwrap(), DiscoveryOutcome::Opened);
        assert!(mock.is_open());
        assert_eq!(mock.close_count(), 0);
    }

    #[tokio::test]
    async fn test_open_failure_reported() {
        let mock = MockTransport::new(DeviceDescriptor::FTDI_FT232);
        mock.set_present(true);
        mock.fail_next_open("busy");

        let outcome = discover(Arc::new(mock), params(), CancelFlag::new()).await;
        assert!(matches!(outcome, DiscoveryOutcome::OpenFailed { reason } if reason.contains("busy")));
    }

    #[tokio::test]
    async fn test_reader_frames_lines() {
        let mock = MockTransport::new(DeviceDescriptor::FTDI_FT232);
        mock.set_present(true);
        mock.open(&DeviceDescriptor::FTDI_FT232, 115_200).await.unwrap();

        let (session_tx, mut session_rx) = mpsc::channel(16);
        let (connection_tx, mut connection_rx) = mpsc::channel(16);
        let _reader = spawn_reader(Arc::new(mock.clone()), 7, session_tx, connection_tx);

        mock.push_chunk(b"O".to_vec());
        mock.push_chunk(b"K\rAVRCP_PAUSE 4\r".to_vec());
        mock.inject_read_error("gone");

        use futures::StreamExt;
        let mut lines = Vec::new();
        for _ in 0..2 {
            match session_rx.next().await.unwrap() {
                SessionMessage::Line(line) => lines.push(line),
                other => panic!("Unexpected {:?}", other),
            }
        }
        assert_eq!(lines, vec!["OK", "AVRCP_PAUSE 4"]);

        match connection_rx.next().await.unwrap() {
            ConnectionMessage::ReadFailed { attempt, .. } => assert_eq!(attempt, 7),
            other => panic!("Unexpected {:?}", other),
        }
    }
}
