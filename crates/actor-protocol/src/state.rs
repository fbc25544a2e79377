/// # Connection State Machine
///
/// Single source of truth for the module link, owned by the connection actor.
///
/// ## State Transition Diagram
///
/// ```text
///                 ┌─────────────────┐
///        ┌───────►│  Disconnected   │◄──────────────────┐
///        │        └────────┬────────┘                   │
///        │                 │ open()                     │ close()
///  timeout /               │                            │
///  denied / close()   ┌────▼───────┐   detach     ┌─────┴────────┐
///        └────────────┤ Connecting │─────────────►│ Reconnecting │
///                     └────┬───────┘              └─────┬────────┘
///                          │ port opens          ▲      │ settle delay
///                          │                     │      │ elapsed
///                     ┌────▼───────┐   detach /  │      │
///                     │ Connected  │─────────────┘      │
///                     └────────────┘   I/O error        │
///                          ▲                            │
///                          └─── Connecting ◄────────────┘
/// ```
///
/// ## State Invariants
///
/// - **Disconnected**: transport closed, no discovery task running
/// - **Connecting**: exactly one discovery attempt in flight
/// - **Connected**: transport open, reader task running
/// - **Reconnecting**: transport closed, waiting out the settle delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ConnectionState {
    /// No active connection, ready to connect
    Disconnected,

    /// Discovery attempt in flight (presence → permission → open)
    Connecting,

    /// Device lost, re-discovery pending
    Reconnecting,

    /// Transport open and reading
    Connected,
}

impl ConnectionState {
    /// Is any part of the connection lifecycle running?
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    /// Validate if transition to new_state is allowed from current state
    pub fn can_transition_to(&self, new_state: ConnectionState) -> bool {
        use ConnectionState::*;

        match (self, new_state) {
            // From Disconnected
            (Disconnected, Connecting) => true,

            // From Connecting
            (Connecting, Connected) => true,    // Port opened
            (Connecting, Disconnected) => true, // Timeout, denial, open failure, close()
            (Connecting, Reconnecting) => true, // Detached mid-discovery

            // From Connected
            (Connected, Reconnecting) => true, // Detach or I/O error
            (Connected, Disconnected) => true, // close()

            // From Reconnecting
            (Reconnecting, Connecting) => true,   // Settle delay elapsed
            (Reconnecting, Disconnected) => true, // close() wins

            // Self-transitions are not transitions
            _ => false,
        }
    }

    /// Convert state to u8 value for atomic storage
    pub fn to_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Reconnecting => 2,
            ConnectionState::Connected => 3,
        }
    }

    /// Convert u8 value back to state
    /// Returns None if value is invalid
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ConnectionState::Disconnected),
            1 => Some(ConnectionState::Connecting),
            2 => Some(ConnectionState::Reconnecting),
            3 => Some(ConnectionState::Connected),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}
