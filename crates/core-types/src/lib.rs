//! Shared vocabulary of the Melody Audio bridge.
//!
//! - [`Transport`]: the byte-level seam to the serial adapter
//! - [`Command`]: outbound command lines
//! - [`ProtocolEvent`]: one classified response line

use serde::{Deserialize, Serialize};

pub mod command;
pub mod transport;

pub use command::{Command, TransportControl, Verb};
pub use transport::{DeviceDescriptor, Permission, Transport, TransportError};

/// Small integer handle the module assigns to each link.
pub type LinkId = u8;

/// Module error code for "no name known for that address".
pub const ERROR_NAME_NOT_FOUND: u16 = 0x19;

/// AVRCP response sub-types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AvrcpKind {
    /// Track metadata; carries no link id on the wire.
    Media,
    Play,
    Stop,
    Pause,
    Forward,
    Backward,
    Other(String),
}

impl AvrcpKind {
    pub fn from_key(key: &str) -> Self {
        match key {
            "AVRCP_MEDIA" => Self::Media,
            "AVRCP_PLAY" => Self::Play,
            "AVRCP_STOP" => Self::Stop,
            "AVRCP_PAUSE" => Self::Pause,
            "AVRCP_FORWARD" => Self::Forward,
            "AVRCP_BACKWARD" => Self::Backward,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallProfile {
    /// Audio gateway role.
    Hfpag,
    Hfp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallStatus {
    Active,
    Dial,
    End,
    Incoming,
    Memory,
    Outgoing,
    Redial,
    Other(String),
}

impl CallStatus {
    pub fn from_key(key: &str) -> Self {
        match key {
            "CALL_ACTIVE" => Self::Active,
            "CALL_DIAL" => Self::Dial,
            "CALL_END" => Self::End,
            "CALL_INCOMING" => Self::Incoming,
            "CALL_MEMORY" => Self::Memory,
            "CALL_OUTGOING" => Self::Outgoing,
            "CALL_REDIAL" => Self::Redial,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamStatus {
    Start,
    Suspend,
    Other(String),
}

impl StreamStatus {
    pub fn from_key(key: &str) -> Self {
        match key {
            "A2DP_STREAM_START" => Self::Start,
            "A2DP_STREAM_SUSPEND" => Self::Suspend,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Phonebook pull status commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PullCommand {
    /// Payload lines follow until the end marker.
    Start,
    /// Pull finished (`PB_PULL_OK`).
    Done,
    Other(String),
}

impl PullCommand {
    pub fn from_key(key: &str) -> Self {
        match key {
            "PB_PULL_START" => Self::Start,
            "PB_PULL_OK" => Self::Done,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One classified response line.
///
/// Each variant carries only what its line category provides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolEvent {
    /// `OK`
    Ok,
    /// `ERROR 0x..`; `code` is `None` for a bare `ERROR`.
    Error { code: Option<u16> },
    /// `PENDING`: accepted, not yet complete.
    Pending,
    /// `KEY=VALUE`
    Preference { key: String, value: String },
    Avrcp {
        /// `None` for [`AvrcpKind::Media`].
        link_id: Option<LinkId>,
        kind: AvrcpKind,
        extras: Vec<String>,
    },
    AbsoluteVolume { link_id: LinkId, volume: u8 },
    CallStatus {
        link_id: LinkId,
        profile: CallProfile,
        status: CallStatus,
    },
    CallerNumber { link_id: LinkId, number: String },
    StreamStatus { link_id: LinkId, status: StreamStatus },
    PhonebookPull { link_id: LinkId, command: PullCommand },
    /// One line captured between `PB_PULL_START` and `PB_PULL_END`.
    PhonebookData { link_id: LinkId, data: String },
    Name { address: String, name: String },
    LinkLoss { link_id: LinkId },
    State {
        connected: u8,
        connectable: bool,
        discoverable: bool,
        ble: String,
    },
    LinkStatus {
        link_id: LinkId,
        status: String,
        profile: String,
        address: String,
        extras: Vec<String>,
    },
    List { address: String, profiles: Vec<String> },
}

impl ProtocolEvent {
    /// Does this event answer the oldest outstanding command?
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Ok | Self::Error { .. } | Self::Pending)
    }

    /// Link the event is scoped to, if any.
    pub fn link_id(&self) -> Option<LinkId> {
        match self {
            Self::Avrcp { link_id, .. } => *link_id,
            Self::AbsoluteVolume { link_id, .. }
            | Self::CallStatus { link_id, .. }
            | Self::CallerNumber { link_id, .. }
            | Self::StreamStatus { link_id, .. }
            | Self::PhonebookPull { link_id, .. }
            | Self::PhonebookData { link_id, .. }
            | Self::LinkLoss { link_id }
            | Self::LinkStatus { link_id, .. } => Some(*link_id),
            _ => None,
        }
    }
}
