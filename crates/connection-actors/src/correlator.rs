use actor_protocol::BridgeError;
use std::collections::VecDeque;

/// A command waiting for its acknowledgement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    /// Command name, e.g. `STATUS`
    pub token: String,
    pub sequence: u64,
}

/// Pairs `OK` / `ERROR` / `PENDING` lines with sent commands.
///
/// The module answers strictly in send order, so resolution always takes
/// the oldest entry and never matches by name.
#[derive(Debug, Default)]
pub struct CommandCorrelator {
    queue: VecDeque<PendingCommand>,
    next_sequence: u64,
}

impl CommandCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a command about to be written; returns its sequence number.
    pub fn register(&mut self, token: &str) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.queue.push_back(PendingCommand {
            token: token.to_string(),
            sequence,
        });
        sequence
    }

    /// Take the oldest pending command for an acknowledgement line.
    pub fn resolve(&mut self, ack: &str) -> Result<PendingCommand, BridgeError> {
        self.queue
            .pop_front()
            .ok_or_else(|| BridgeError::ProtocolDesync(ack.to_string()))
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
