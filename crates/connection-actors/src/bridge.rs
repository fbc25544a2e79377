use actor_protocol::{BridgeError, ConnectionState, MediaIntent, SystemEvent};
use actor_runtime::{
    actor_warn, spawn_actor, ChannelManager, ConnectionMessage, ListenerId, SessionMessage,
};
use core_types::{Command, DeviceDescriptor, Transport};
use futures_channel::mpsc;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::connection_actor::ConnectionActor;
use crate::session_actor::SessionActor;
use crate::sink::MediaControlSink;
use crate::BridgeConfig;

/// Host-facing handle to a running bridge
///
/// Every method posts a message and returns immediately; results show up
/// on the event receiver or on state/event subscriptions.
///
/// ## Architecture
///
/// ```text
/// Host
///     ↓ (open / close / send_command / media_intent)
/// Bridge
///     ↓ (ConnectionMessage)          ↓ (SessionMessage)
/// ConnectionActor  ── lines ──→  SessionActor  ──→  MediaControlSink
///     ↑ (Write)  ←──────────────────┘
///     ↓ (SystemEvent)
/// Host event receiver / subscribers
/// ```
pub struct Bridge {
    manager: ChannelManager,
    state: Arc<AtomicU8>,
    next_listener: AtomicU64,
    tasks: Vec<JoinHandle<()>>,
}

impl Bridge {
    /// Validate `config` and spawn both actors
    ///
    /// Must be called from inside a tokio runtime.
    pub fn spawn(
        transport: Arc<dyn Transport>,
        sink: Arc<dyn MediaControlSink>,
        config: BridgeConfig,
    ) -> Result<Self, BridgeError> {
        config.validate()?;

        let (manager, handles) = ChannelManager::new(config.channel_capacity);
        let state = Arc::new(AtomicU8::new(ConnectionState::Disconnected.to_u8()));

        let session = SessionActor::new(sink, &config, manager.connection_sender());
        let connection = ConnectionActor::new(
            transport,
            config,
            state.clone(),
            manager.connection_sender(),
            manager.session_sender(),
            handles.event_tx.clone(),
        );

        let tasks = vec![
            spawn_actor(connection, handles.connection_rx, handles.event_tx.clone()),
            spawn_actor(session, handles.session_rx, handles.event_tx),
        ];

        Ok(Self {
            manager,
            state,
            next_listener: AtomicU64::new(1),
            tasks,
        })
    }

    // ═══════════════════════════════════════════════════════════════
    // Connection lifecycle
    // ═══════════════════════════════════════════════════════════════

    /// Start discovery; ignored while a connection is active
    pub fn open(&self) -> Result<(), BridgeError> {
        self.manager.send_connection(ConnectionMessage::Open)
    }

    /// Tear down; always ends Disconnected
    pub fn close(&self) -> Result<(), BridgeError> {
        self.manager.send_connection(ConnectionMessage::Close)
    }

    /// Forward a platform detach notification
    pub fn device_detached(&self, device: DeviceDescriptor) -> Result<(), BridgeError> {
        self.manager
            .send_connection(ConnectionMessage::DeviceDetached(device))
    }

    /// Last state published by the connection actor
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
            .unwrap_or(ConnectionState::Disconnected)
    }

    // ═══════════════════════════════════════════════════════════════
    // Commands and media control
    // ═══════════════════════════════════════════════════════════════

    /// Queue a raw module command
    ///
    /// The outcome arrives as [`SystemEvent::CommandResolved`] to event
    /// subscribers, or [`SystemEvent::Error`] if not connected.
    pub fn send_command(&self, command: Command) -> Result<(), BridgeError> {
        self.manager.send_session(SessionMessage::Send(command))
    }

    pub fn media_intent(&self, intent: MediaIntent) -> Result<(), BridgeError> {
        self.manager.send_session(SessionMessage::Intent(intent))
    }

    // ═══════════════════════════════════════════════════════════════
    // Subscriptions
    // ═══════════════════════════════════════════════════════════════

    fn next_id(&self) -> ListenerId {
        self.next_listener.fetch_add(1, Ordering::Relaxed)
    }

    /// Receive every [`SystemEvent::StateChanged`] from now on
    pub fn subscribe_state(
        &self,
    ) -> Result<(ListenerId, mpsc::Receiver<SystemEvent>), BridgeError> {
        let id = self.next_id();
        let (tx, rx) = mpsc::channel(crate::constants::channels::CAPACITY);
        self.manager
            .send_connection(ConnectionMessage::SubscribeState { id, tx })?;
        Ok((id, rx))
    }

    pub fn unsubscribe_state(&self, id: ListenerId) -> Result<(), BridgeError> {
        self.manager
            .send_connection(ConnectionMessage::UnsubscribeState { id })
    }

    /// Receive classified protocol events and command resolutions
    pub fn subscribe_events(
        &self,
    ) -> Result<(ListenerId, mpsc::Receiver<SystemEvent>), BridgeError> {
        let id = self.next_id();
        let (tx, rx) = mpsc::channel(crate::constants::channels::CAPACITY);
        self.manager
            .send_session(SessionMessage::SubscribeEvents { id, tx })?;
        Ok((id, rx))
    }

    pub fn unsubscribe_events(&self, id: ListenerId) -> Result<(), BridgeError> {
        self.manager
            .send_session(SessionMessage::UnsubscribeEvents { id })
    }

    /// Take the host event channel (state changes, failures, actor errors)
    pub fn take_event_receiver(&mut self) -> mpsc::Receiver<SystemEvent> {
        self.manager.take_event_receiver()
    }

    /// Close the connection and stop both actors
    ///
    /// The actors hold each other's senders, so their inboxes never drain
    /// on their own; they are aborted once the close has landed.
    pub async fn shutdown(self) {
        if self.close().is_ok() {
            let wait = async {
                while self.state() != ConnectionState::Disconnected {
                    tokio::time::sleep(Duration::from_millis(
                        crate::constants::discovery::POLL_MS,
                    ))
                    .await;
                }
            };
            let limit = Duration::from_millis(crate::constants::SHUTDOWN_TIMEOUT_MS);
            if tokio::time::timeout(limit, wait).await.is_err() {
                actor_warn!("Bridge did not reach Disconnected before shutdown");
            }
        }
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;
    use transport_mock::MockTransport;

    fn spawn_bridge(config: BridgeConfig) -> (Bridge, MockTransport) {
        let mock = MockTransport::new(config.device);
        let bridge = Bridge::spawn(
            Arc::new(mock.clone()),
            Arc::new(RecordingSink::default()),
            config,
        )
        .unwrap();
        (bridge, mock)
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = BridgeConfig {
            channel_capacity: 0,
            ..BridgeConfig::default()
        };
        let result = Bridge::spawn(
            Arc::new(MockTransport::new(config.device)),
            Arc::new(RecordingSink::default()),
            config,
        );
        assert!(matches!(result, Err(BridgeError::Config(_))));
    }

    #[tokio::test]
    async fn test_starts_disconnected() {
        let (bridge, _mock) = spawn_bridge(BridgeConfig::default());
        assert_eq!(bridge.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_listener_ids_unique() {
        let (bridge, _mock) = spawn_bridge(BridgeConfig::default());
        let (a, _rx_a) = bridge.subscribe_state().unwrap();
        let (b, _rx_b) = bridge.subscribe_events().unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_shutdown_closes_transport() {
        let (bridge, mock) = spawn_bridge(BridgeConfig::default());
        mock.set_present(true);
        bridge.open().unwrap();
        while bridge.state() != ConnectionState::Connected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        bridge.shutdown().await;
        assert!(!mock.is_open());
        assert_eq!(mock.close_count(), 1);
    }
}
