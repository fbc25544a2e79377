use std::fmt;

use serde::{Deserialize, Serialize};

use crate::LinkId;

/// Command verbs understood by the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verb {
    Reset,
    Config,
    Get,
    Set,
    Write,
    List,
    Status,
    Name,
    Call,
    Media,
    /// AVRCP transport control (`MUSIC <link> PLAY`, ...).
    Music,
    Discoverable,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reset => "RESET",
            Self::Config => "CONFIG",
            Self::Get => "GET",
            Self::Set => "SET",
            Self::Write => "WRITE",
            Self::List => "LIST",
            Self::Status => "STATUS",
            Self::Name => "NAME",
            Self::Call => "CALL",
            Self::Media => "MEDIA",
            Self::Music => "MUSIC",
            Self::Discoverable => "DISCOVERABLE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Playback controls sent to a remote AVRCP target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportControl {
    Play,
    Pause,
    Stop,
    Forward,
    Backward,
}

impl TransportControl {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Play => "PLAY",
            Self::Pause => "PAUSE",
            Self::Stop => "STOP",
            Self::Forward => "FORWARD",
            Self::Backward => "BACKWARD",
        }
    }
}

/// One outbound command line, without its terminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub verb: Verb,
    pub args: Option<String>,
}

impl Command {
    pub fn new(verb: Verb) -> Self {
        Self { verb, args: None }
    }

    pub fn with_args(verb: Verb, args: impl Into<String>) -> Self {
        let args = args.into();
        Self {
            verb,
            args: (!args.is_empty()).then_some(args),
        }
    }

    pub fn transport_control(link_id: LinkId, control: TransportControl) -> Self {
        Self::with_args(Verb::Music, format!("{} {}", link_id, control.as_str()))
    }

    /// Correlation token: the command name.
    pub fn token(&self) -> &'static str {
        self.verb.as_str()
    }

    /// `VERB` or `VERB ARGS`
    pub fn to_line(&self) -> String {
        match &self.args {
            Some(args) => format!("{} {}", self.verb, args),
            None => self.verb.to_string(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}
