use actor_protocol::{BridgeError, ConnectionState, MediaIntent, SystemEvent};
use core_types::{Command, DeviceDescriptor};
use futures_channel::mpsc;

/// Identifies one registered listener so it can be removed again
pub type ListenerId = u64;

/// How one discovery attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// Transport opened
    Opened,
    /// No matching device within the timeout
    NotFound,
    PermissionDenied,
    /// Transport refused to open
    OpenFailed { reason: String },
    /// Cancel flag seen before the transport was opened
    Cancelled,
}

/// Messages for the connection actor
#[derive(Debug)]
pub enum ConnectionMessage {
    /// Host asked to connect
    Open,
    /// Host asked to disconnect; always wins
    Close,
    /// Platform reported a device going away
    DeviceDetached(DeviceDescriptor),
    /// Settle delay after a detach has elapsed
    ReconnectSettled { attempt: u64 },
    /// Discovery task finished
    DiscoveryFinished {
        /// Operation sequence number to match against the current attempt
        attempt: u64,
        outcome: DiscoveryOutcome,
    },
    /// Reader task hit a transport error
    ReadFailed { attempt: u64, reason: String },
    /// Framed command bytes to write
    Write { bytes: Vec<u8> },
    SubscribeState {
        id: ListenerId,
        tx: mpsc::Sender<SystemEvent>,
    },
    UnsubscribeState { id: ListenerId },
}

/// Messages for the session actor
#[derive(Debug)]
pub enum SessionMessage {
    /// One complete line from the reader task
    Line(String),
    /// Connection state as seen by the connection actor
    ConnectionStateChanged(ConnectionState),
    /// Host command to send through the correlator
    Send(Command),
    /// Host media control intent
    Intent(MediaIntent),
    SubscribeEvents {
        id: ListenerId,
        tx: mpsc::Sender<SystemEvent>,
    },
    UnsubscribeEvents { id: ListenerId },
}

/// Handles for spawning actors
pub struct ActorHandles {
    pub connection_rx: mpsc::Receiver<ConnectionMessage>,
    pub session_rx: mpsc::Receiver<SessionMessage>,
    pub event_tx: mpsc::Sender<SystemEvent>,
}

/// Channel manager for actor communication
///
/// This manages all communication channels between actors and provides
/// a unified interface for sending messages.
pub struct ChannelManager {
    // Senders for each actor (all Clone)
    // Using bounded channels to prevent memory exhaustion under high load
    connection_tx: mpsc::Sender<ConnectionMessage>,
    session_tx: mpsc::Sender<SessionMessage>,

    // Event receiver, taken once by the host with take_event_receiver()
    event_rx: mpsc::Receiver<SystemEvent>,
}

impl ChannelManager {
    /// Create a new channel manager and actor handles
    ///
    /// Returns (ChannelManager for the host, ActorHandles for spawning actors).
    /// Every channel gets `capacity` slots.
    pub fn new(capacity: usize) -> (Self, ActorHandles) {
        let (connection_tx, connection_rx) = mpsc::channel(capacity);
        let (session_tx, session_rx) = mpsc::channel(capacity);
        let (event_tx, event_rx) = mpsc::channel(capacity);

        let handles = ActorHandles {
            connection_rx,
            session_rx,
            event_tx,
        };

        let manager = Self {
            connection_tx,
            session_tx,
            event_rx,
        };

        (manager, handles)
    }

    pub fn send_connection(&self, msg: ConnectionMessage) -> Result<(), BridgeError> {
        self.connection_tx.clone().try_send(msg).map_err(|e| {
            if e.is_full() {
                BridgeError::ChannelClosed(
                    "System overloaded: connection queue full. Slow down requests.".into(),
                )
            } else {
                BridgeError::ChannelClosed("Connection actor stopped".into())
            }
        })
    }

    pub fn send_session(&self, msg: SessionMessage) -> Result<(), BridgeError> {
        self.session_tx.clone().try_send(msg).map_err(|e| {
            if e.is_full() {
                BridgeError::ChannelClosed(
                    "System overloaded: session queue full. Slow down requests.".into(),
                )
            } else {
                BridgeError::ChannelClosed("Session actor stopped".into())
            }
        })
    }

    /// Take ownership of event receiver
    ///
    /// Events sent after a second call are lost; take it once.
    pub fn take_event_receiver(&mut self) -> mpsc::Receiver<SystemEvent> {
        let (_new_tx, new_rx) = mpsc::channel(1);
        std::mem::replace(&mut self.event_rx, new_rx)
    }

    /// Clone senders for direct actor-to-actor communication
    pub fn connection_sender(&self) -> mpsc::Sender<ConnectionMessage> {
        self.connection_tx.clone()
    }

    pub fn session_sender(&self) -> mpsc::Sender<SessionMessage> {
        self.session_tx.clone()
    }
}
