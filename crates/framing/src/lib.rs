use core_types::Command;

pub mod lines;

pub use lines::{encode_command, LineFramer, LINE_TERMINATOR};

/// Trait for converting a stream of bytes into complete protocol lines.
pub trait Framer: Send {
    /// Ingest new bytes and return any complete lines found.
    ///
    /// # Arguments
    /// * `bytes` - The new chunk of data read from transport.
    fn push(&mut self, bytes: &[u8]) -> Vec<String>;

    /// Reset internal state (e.g., clear buffers).
    fn reset(&mut self);

    /// Frame an outbound command for the wire.
    fn encode(&self, command: &Command) -> Vec<u8>;
}
