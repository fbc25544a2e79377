use actor_protocol::{BridgeError, ConnectionState, SystemEvent};
use actor_runtime::{
    actor_debug, actor_info, actor_warn, spawn_delayed, Actor, CancelFlag, ConnectionMessage,
    DiscoveryOutcome, ListenerId, SessionMessage, TimeoutHandle,
};
use async_trait::async_trait;
use core_types::{DeviceDescriptor, Transport};
use futures_channel::mpsc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::discovery::{spawn_discovery, spawn_reader, DiscoveryParams};
use crate::BridgeConfig;

/// ConnectionActor owns the transport lifecycle
///
/// Responsibilities:
/// - Maintain single source of truth for connection state
/// - Run discovery attempts (presence → permission → open) in the background
/// - Serialize every transport write
/// - Turn detaches and I/O errors into a reconnect
/// - Notify state listeners, the host event channel and the session actor
///
/// ## State Machine
///
/// For the transition diagram and invariants, see
/// `actor-protocol/src/state.rs` - ConnectionState documentation.
///
/// Every background task is tagged with the attempt id current when it
/// started. Bumping the id is how `close()` and a new attempt invalidate
/// anything still in flight.
///
/// At most one discovery task runs at a time. A new attempt started while
/// an older one is still inside `open()` is queued until the older one
/// reports; if it reports `Opened`, the actor closes the transport before
/// the queued attempt starts.
pub struct ConnectionActor {
    state: ConnectionState,
    shared_state: Arc<AtomicU8>,
    transport: Arc<dyn Transport>,
    config: BridgeConfig,

    // Channel to send messages to self (task results, settle timer)
    self_tx: mpsc::Sender<ConnectionMessage>,
    session_tx: mpsc::Sender<SessionMessage>,
    event_tx: mpsc::Sender<SystemEvent>,

    listeners: Vec<(ListenerId, mpsc::Sender<SystemEvent>)>,

    // Operation sequence tracking for detecting stale task results
    attempt: u64,
    cancel: Option<CancelFlag>,
    // Attempt id of the discovery task still running, stale or not
    discovery_running: Option<u64>,
    discovery_queued: bool,
    settle_timer: Option<TimeoutHandle>,
    reader: Option<JoinHandle<()>>,
}

impl ConnectionActor {
    pub fn new(
        transport: Arc<dyn Transport>,
        config: BridgeConfig,
        shared_state: Arc<AtomicU8>,
        self_tx: mpsc::Sender<ConnectionMessage>,
        session_tx: mpsc::Sender<SessionMessage>,
        event_tx: mpsc::Sender<SystemEvent>,
    ) -> Self {
        shared_state.store(ConnectionState::Disconnected.to_u8(), Ordering::Release);
        Self {
            state: ConnectionState::Disconnected,
            shared_state,
            transport,
            config,
            self_tx,
            session_tx,
            event_tx,
            listeners: Vec::new(),
            attempt: 0,
            cancel: None,
            discovery_running: None,
            discovery_queued: false,
            settle_timer: None,
            reader: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn next_attempt(&mut self) -> u64 {
        self.attempt = self.attempt.wrapping_add(1);
        self.attempt
    }

    /// Attempt to transition to a new state
    ///
    /// Listeners are notified once per successful transition, through
    /// their channels, never inline.
    fn transition(&mut self, new_state: ConnectionState) -> Result<(), BridgeError> {
        if !self.state.can_transition_to(new_state) {
            return Err(BridgeError::InvalidTransition(format!(
                "{:?} → {:?}",
                self.state, new_state
            )));
        }

        let old_state = self.state;
        self.state = new_state;
        self.shared_state
            .store(new_state.to_u8(), Ordering::Release);

        actor_info!("State: {:?} → {:?}", old_state, new_state);

        self.notify(SystemEvent::StateChanged { state: new_state });
        if let Err(e) = self
            .session_tx
            .clone()
            .try_send(SessionMessage::ConnectionStateChanged(new_state))
        {
            actor_warn!("Session state update dropped: {:?}", e);
        }

        Ok(())
    }

    /// Send to the host event channel and every state listener
    ///
    /// Listeners whose receiver is gone are pruned.
    fn notify(&mut self, event: SystemEvent) {
        if let Err(e) = self.event_tx.clone().try_send(event.clone()) {
            actor_debug!("Host event dropped: {:?}", e);
        }
        self.listeners.retain(|(id, tx)| match tx.clone().try_send(event.clone()) {
            Ok(()) => true,
            Err(e) if e.is_disconnected() => {
                actor_debug!("State listener {} gone", id);
                false
            }
            Err(_) => {
                actor_warn!("State listener {} is full, event dropped", id);
                true
            }
        });
    }

    fn report_failure(&mut self, err: BridgeError) {
        actor_warn!("Connection attempt failed: {}", err);
        self.notify(SystemEvent::ConnectionFailed {
            reason: err.to_string(),
        });
    }

    fn start_discovery(&mut self) {
        let attempt = self.next_attempt();
        self.cancel = Some(CancelFlag::new());
        if let Some(running) = self.discovery_running {
            actor_debug!("Attempt {} waits for attempt {} to finish", attempt, running);
            self.discovery_queued = true;
            return;
        }
        self.spawn_attempt();
    }

    fn spawn_attempt(&mut self) {
        let attempt = self.attempt;
        let cancel = self.cancel.get_or_insert_with(CancelFlag::new).clone();
        self.discovery_queued = false;
        self.discovery_running = Some(attempt);
        actor_debug!("Discovery attempt {} for {}", attempt, self.config.device);

        spawn_discovery(
            self.transport.clone(),
            DiscoveryParams::from(&self.config),
            cancel,
            attempt,
            self.self_tx.clone(),
        );
    }

    /// Stop every background task and invalidate their results
    fn cancel_tasks(&mut self) {
        self.next_attempt();
        self.discovery_queued = false;
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        // Discovery checks the flag at every poll and reports on its own.
        if let Some(timer) = self.settle_timer.take() {
            timer.cancel();
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }

    async fn close_transport(&self) {
        if let Err(e) = self.transport.close().await {
            actor_warn!("Transport close failed: {}", e);
        }
    }

    async fn handle_open(&mut self) -> Result<(), BridgeError> {
        if self.state.is_active() {
            actor_debug!("Open ignored, already {:?}", self.state);
            return Ok(());
        }
        self.transition(ConnectionState::Connecting)?;
        self.start_discovery();
        Ok(())
    }

    async fn handle_close(&mut self) -> Result<(), BridgeError> {
        self.cancel_tasks();
        if self.state == ConnectionState::Disconnected {
            actor_debug!("Close ignored, already Disconnected");
            return Ok(());
        }
        self.close_transport().await;
        self.transition(ConnectionState::Disconnected)
    }

    async fn handle_detached(&mut self, device: DeviceDescriptor) -> Result<(), BridgeError> {
        if device != self.config.device {
            actor_debug!("Ignoring detach of untracked device {}", device);
            return Ok(());
        }
        match self.state {
            ConnectionState::Connected => self.begin_reconnect(true).await,
            ConnectionState::Connecting => self.begin_reconnect(false).await,
            _ => {
                actor_debug!("Detach of {} ignored in {:?}", device, self.state);
                Ok(())
            }
        }
    }

    /// Connected/Connecting → Reconnecting, then back into discovery
    async fn begin_reconnect(&mut self, was_connected: bool) -> Result<(), BridgeError> {
        self.cancel_tasks();
        self.close_transport().await;
        self.transition(ConnectionState::Reconnecting)?;

        if was_connected && self.config.settle_delay_ms > 0 {
            let attempt = self.attempt;
            self.settle_timer = Some(spawn_delayed(
                self.self_tx.clone(),
                ConnectionMessage::ReconnectSettled { attempt },
                self.config.settle_delay_ms,
            ));
            Ok(())
        } else {
            self.transition(ConnectionState::Connecting)?;
            self.start_discovery();
            Ok(())
        }
    }

    async fn handle_settled(&mut self, attempt: u64) -> Result<(), BridgeError> {
        if attempt != self.attempt || self.state != ConnectionState::Reconnecting {
            actor_debug!("Stale settle timer for attempt {}", attempt);
            return Ok(());
        }
        self.settle_timer = None;
        self.transition(ConnectionState::Connecting)?;
        self.start_discovery();
        Ok(())
    }

    async fn handle_discovery_finished(
        &mut self,
        attempt: u64,
        outcome: DiscoveryOutcome,
    ) -> Result<(), BridgeError> {
        if self.discovery_running == Some(attempt) {
            self.discovery_running = None;
        }
        if attempt != self.attempt || self.state != ConnectionState::Connecting {
            actor_debug!(
                "Dropping stale discovery result {:?} (attempt {}, current {})",
                outcome,
                attempt,
                self.attempt
            );
            // No other attempt ran while this one held the transport.
            if outcome == DiscoveryOutcome::Opened {
                self.close_transport().await;
            }
            if self.discovery_queued && self.state == ConnectionState::Connecting {
                self.spawn_attempt();
            }
            return Ok(());
        }
        self.cancel = None;

        match outcome {
            DiscoveryOutcome::Opened => {
                self.transition(ConnectionState::Connected)?;
                self.reader = Some(spawn_reader(
                    self.transport.clone(),
                    attempt,
                    self.session_tx.clone(),
                    self.self_tx.clone(),
                ));
                Ok(())
            }
            DiscoveryOutcome::NotFound => {
                self.transition(ConnectionState::Disconnected)?;
                self.report_failure(BridgeError::TransportUnavailable {
                    device: self.config.device.to_string(),
                    timeout_ms: self.config.discovery_timeout_ms,
                });
                Ok(())
            }
            DiscoveryOutcome::PermissionDenied => {
                self.transition(ConnectionState::Disconnected)?;
                self.report_failure(BridgeError::PermissionDenied(
                    self.config.device.to_string(),
                ));
                Ok(())
            }
            DiscoveryOutcome::OpenFailed { reason } => {
                self.close_transport().await;
                self.transition(ConnectionState::Disconnected)?;
                self.report_failure(BridgeError::TransportIo(reason));
                Ok(())
            }
            DiscoveryOutcome::Cancelled => {
                actor_debug!("Attempt {} cancelled without a newer one", attempt);
                Ok(())
            }
        }
    }

    async fn handle_read_failed(&mut self, attempt: u64, reason: String) -> Result<(), BridgeError> {
        if attempt != self.attempt || self.state != ConnectionState::Connected {
            actor_debug!("Stale read failure for attempt {}: {}", attempt, reason);
            return Ok(());
        }
        actor_warn!("Read failed, reconnecting: {}", reason);
        self.reader = None;
        self.begin_reconnect(true).await
    }

    async fn handle_write(&mut self, bytes: Vec<u8>) -> Result<(), BridgeError> {
        if self.state != ConnectionState::Connected {
            return Err(BridgeError::TransportIo(format!(
                "Write dropped, connection is {:?}",
                self.state
            )));
        }
        if let Err(e) = self.transport.write(&bytes).await {
            actor_warn!("Write failed, reconnecting: {}", e);
            self.begin_reconnect(true).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Actor for ConnectionActor {
    type Message = ConnectionMessage;

    fn name(&self) -> &'static str {
        "ConnectionActor"
    }

    async fn handle(&mut self, msg: Self::Message) -> Result<(), BridgeError> {
        match msg {
            ConnectionMessage::Open => self.handle_open().await,
            ConnectionMessage::Close => self.handle_close().await,
            ConnectionMessage::DeviceDetached(device) => self.handle_detached(device).await,
            ConnectionMessage::ReconnectSettled { attempt } => self.handle_settled(attempt).await,
            ConnectionMessage::DiscoveryFinished { attempt, outcome } => {
                self.handle_discovery_finished(attempt, outcome).await
            }
            ConnectionMessage::ReadFailed { attempt, reason } => {
                self.handle_read_failed(attempt, reason).await
            }
            ConnectionMessage::Write { bytes } => self.handle_write(bytes).await,
            ConnectionMessage::SubscribeState { id, tx } => {
                self.listeners.push((id, tx));
                Ok(())
            }
            ConnectionMessage::UnsubscribeState { id } => {
                self.listeners.retain(|(listener, _)| *listener != id);
                Ok(())
            }
        }
    }

    async fn shutdown(&mut self) {
        self.cancel_tasks();
        if self.state != ConnectionState::Disconnected {
            self.close_transport().await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;
    use transport_mock::MockTransport;

    struct Harness {
        actor: ConnectionActor,
        mock: MockTransport,
        self_rx: mpsc::Receiver<ConnectionMessage>,
        session_rx: mpsc::Receiver<SessionMessage>,
        _event_rx: mpsc::Receiver<SystemEvent>,
    }

    fn harness() -> Harness {
        let config = BridgeConfig {
            discovery_timeout_ms: 100,
            discovery_poll_ms: 5,
            settle_delay_ms: 20,
            permission_poll_ms: 5,
            ..BridgeConfig::default()
        };
        let mock = MockTransport::new(config.device);
        let (self_tx, self_rx) = mpsc::channel(64);
        let (session_tx, session_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::channel(64);
        let actor = ConnectionActor::new(
            Arc::new(mock.clone()),
            config,
            Arc::new(AtomicU8::new(0)),
            self_tx,
            session_tx,
            event_tx,
        );
        Harness {
            actor,
            mock,
            self_rx,
            session_rx,
            _event_rx: event_rx,
        }
    }

    /// Feed the next self-addressed message back into the actor
    async fn pump(h: &mut Harness) {
        let msg = tokio::time::timeout(Duration::from_secs(2), h.self_rx.next())
            .await
            .unwrap()
            .unwrap();
        h.actor.handle(msg).await.unwrap();
    }

    #[tokio::test]
    async fn test_open_then_connected() {
        let mut h = harness();
        h.mock.set_present(true);

        h.actor.handle(ConnectionMessage::Open).await.unwrap();
        assert_eq!(h.actor.state(), ConnectionState::Connecting);

        pump(&mut h).await;
        assert_eq!(h.actor.state(), ConnectionState::Connected);
        assert!(h.mock.is_open());

        // Session saw both transitions in order
        let mut seen = Vec::new();
        while let Ok(Some(SessionMessage::ConnectionStateChanged(s))) = h.session_rx.try_next() {
            seen.push(s);
        }
        assert_eq!(seen, vec![ConnectionState::Connecting, ConnectionState::Connected]);
    }

    #[tokio::test]
    async fn test_open_twice_is_single_attempt() {
        let mut h = harness();
        h.actor.handle(ConnectionMessage::Open).await.unwrap();
        let attempt = h.actor.attempt;
        h.actor.handle(ConnectionMessage::Open).await.unwrap();
        assert_eq!(h.actor.attempt, attempt);
    }

    #[tokio::test]
    async fn test_timeout_ends_disconnected() {
        let mut h = harness();
        h.actor.handle(ConnectionMessage::Open).await.unwrap();
        pump(&mut h).await;
        assert_eq!(h.actor.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut h = harness();
        h.actor.handle(ConnectionMessage::Close).await.unwrap();
        h.actor.handle(ConnectionMessage::Close).await.unwrap();
        assert_eq!(h.actor.state(), ConnectionState::Disconnected);
        assert!(h.session_rx.try_next().is_err());
    }

    #[tokio::test]
    async fn test_stale_discovery_result_dropped() {
        let mut h = harness();
        h.mock.set_present(true);
        h.actor.handle(ConnectionMessage::Open).await.unwrap();
        let stale = h.actor.attempt;
        h.actor.handle(ConnectionMessage::Close).await.unwrap();

        h.actor
            .handle(ConnectionMessage::DiscoveryFinished {
                attempt: stale,
                outcome: DiscoveryOutcome::Opened,
            })
            .await
            .unwrap();
        assert_eq!(h.actor.state(), ConnectionState::Disconnected);
        assert!(!h.mock.is_open());
    }

    #[tokio::test]
    async fn test_reopen_waits_for_slow_open() {
        let mut h = harness();
        h.mock.set_present(true);
        h.mock.delay_next_open(Duration::from_millis(80));

        h.actor.handle(ConnectionMessage::Open).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        h.actor.handle(ConnectionMessage::Close).await.unwrap();
        h.actor.handle(ConnectionMessage::Open).await.unwrap();
        assert_eq!(h.actor.state(), ConnectionState::Connecting);

        // Old attempt reports its open; the actor closes it and starts the queued one
        pump(&mut h).await;
        assert_eq!(h.actor.state(), ConnectionState::Connecting);
        assert_eq!(h.mock.close_count(), 1);

        pump(&mut h).await;
        assert_eq!(h.actor.state(), ConnectionState::Connected);
        assert!(h.mock.is_open());
        assert_eq!(h.mock.open_count(), 2);
        assert_eq!(h.mock.max_concurrent_opens(), 1);
    }

    #[tokio::test]
    async fn test_detach_reconnects_after_settle() {
        let mut h = harness();
        h.mock.set_present(true);
        h.actor.handle(ConnectionMessage::Open).await.unwrap();
        pump(&mut h).await;

        h.actor
            .handle(ConnectionMessage::DeviceDetached(DeviceDescriptor::FTDI_FT232))
            .await
            .unwrap();
        assert_eq!(h.actor.state(), ConnectionState::Reconnecting);
        assert!(!h.mock.is_open());

        // Settle timer, then discovery
        pump(&mut h).await;
        assert_eq!(h.actor.state(), ConnectionState::Connecting);
        pump(&mut h).await;
        assert_eq!(h.actor.state(), ConnectionState::Connected);
        assert_eq!(h.mock.open_count(), 2);
    }

    #[tokio::test]
    async fn test_detach_of_other_device_ignored() {
        let mut h = harness();
        h.mock.set_present(true);
        h.actor.handle(ConnectionMessage::Open).await.unwrap();
        pump(&mut h).await;

        h.actor
            .handle(ConnectionMessage::DeviceDetached(DeviceDescriptor::new(1, 2)))
            .await
            .unwrap();
        assert_eq!(h.actor.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_write_when_disconnected_is_error() {
        let mut h = harness();
        let err = h
            .actor
            .handle(ConnectionMessage::Write {
                bytes: b"STATUS\r".to_vec(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::TransportIo(_)));
    }

    #[tokio::test]
    async fn test_write_error_triggers_reconnect() {
        let mut h = harness();
        h.mock.set_present(true);
        h.actor.handle(ConnectionMessage::Open).await.unwrap();
        pump(&mut h).await;

        h.mock.set_write_error(Some("stall".into()));
        h.actor
            .handle(ConnectionMessage::Write {
                bytes: b"STATUS\r".to_vec(),
            })
            .await
            .unwrap();
        assert_eq!(h.actor.state(), ConnectionState::Reconnecting);
    }

    #[tokio::test]
    async fn test_unsubscribed_listener_gets_nothing() {
        let mut h = harness();
        let (tx, mut rx) = mpsc::channel(8);
        h.actor
            .handle(ConnectionMessage::SubscribeState { id: 1, tx })
            .await
            .unwrap();
        h.actor
            .handle(ConnectionMessage::UnsubscribeState { id: 1 })
            .await
            .unwrap();
        h.actor.handle(ConnectionMessage::Open).await.unwrap();

        // Sender dropped on unsubscribe, so the stream ends empty
        assert_eq!(rx.next().await, None);
    }
}
