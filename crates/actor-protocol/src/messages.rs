use crate::state::ConnectionState;
use core_types::{LinkId, ProtocolEvent};
use serde::{Deserialize, Serialize};

/// Playback state reported to the media control sink
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Track metadata for one link
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MediaMetadata {
    pub album: Option<String>,
    pub artist: Option<String>,
    pub title: Option<String>,
}

impl MediaMetadata {
    /// Apply one `KEY:VALUE` field from an `AVRCP_MEDIA` line.
    /// Returns false for keys that are not tracked.
    pub fn apply_field(&mut self, field: &str) -> bool {
        let Some((key, value)) = field.split_once(':') else {
            return false;
        };
        let slot = match key {
            "ALBUM" => &mut self.album,
            "ARTIST" => &mut self.artist,
            "TITLE" => &mut self.title,
            _ => return false,
        };
        *slot = Some(value.to_string());
        true
    }
}

/// Answer to an audio focus request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Focus {
    Granted,
    Denied,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MediaAction {
    Play,
    Pause,
    Next,
    Previous,
    /// Host took audio focus away
    FocusLost,
}

/// User intent from host media controls
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaIntent {
    pub action: MediaAction,
    /// `None` targets the playing link, else the most recently active one
    pub link_id: Option<LinkId>,
}

impl MediaIntent {
    pub fn new(action: MediaAction) -> Self {
        Self {
            action,
            link_id: None,
        }
    }

    pub fn for_link(action: MediaAction, link_id: LinkId) -> Self {
        Self {
            action,
            link_id: Some(link_id),
        }
    }
}

/// How the module answered a command
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CommandOutcome {
    Ok,
    Error { code: Option<u16> },
    Pending,
}

impl CommandOutcome {
    /// Outcome carried by an acknowledgement event, if it is one.
    pub fn from_event(event: &ProtocolEvent) -> Option<Self> {
        match event {
            ProtocolEvent::Ok => Some(Self::Ok),
            ProtocolEvent::Error { code } => Some(Self::Error { code: *code }),
            ProtocolEvent::Pending => Some(Self::Pending),
            _ => None,
        }
    }
}

/// Events from Actor system to host
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SystemEvent {
    /// Connection state has changed
    StateChanged { state: ConnectionState },

    /// Discovery attempt ended without a connection; needs a fresh open()
    ConnectionFailed { reason: String },

    /// A classified response line
    Protocol { event: ProtocolEvent },

    /// An acknowledgement was paired with the oldest pending command
    CommandResolved {
        command: String,
        sequence: u64,
        outcome: CommandOutcome,
    },

    /// Error occurred
    Error { message: String },
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_fields() {
        let mut meta = MediaMetadata::default();
        assert!(meta.apply_field("TITLE:Song"));
        assert!(meta.apply_field("ARTIST:Band: Live"));
        assert!(!meta.apply_field("GENRE:Rock"));
        assert!(!meta.apply_field("garbage"));

        assert_eq!(meta.title.as_deref(), Some("Song"));
        assert_eq!(meta.artist.as_deref(), Some("Band: Live"));
        assert_eq!(meta.album, None);
    }

    #[test]
    fn test_outcome_from_event() {
        assert_eq!(
            CommandOutcome::from_event(&ProtocolEvent::Error { code: Some(0x19) }),
            Some(CommandOutcome::Error { code: Some(0x19) })
        );
        assert_eq!(
            CommandOutcome::from_event(&ProtocolEvent::LinkLoss { link_id: 1 }),
            None
        );
    }

    #[test]
    fn test_system_event_serialization() {
        let event = SystemEvent::StateChanged {
            state: ConnectionState::Connected,
        };
        let json = serde_json::to_string(&event).unwrap();
        let deserialized: SystemEvent = serde_json::from_str(&json).unwrap();

        match deserialized {
            SystemEvent::StateChanged { state } => {
                assert_eq!(state, ConnectionState::Connected);
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_intent_targets() {
        assert_eq!(MediaIntent::new(MediaAction::Play).link_id, None);
        assert_eq!(
            MediaIntent::for_link(MediaAction::Next, 3).link_id,
            Some(3)
        );
    }
}
