use crate::Framer;
use core_types::Command;

/// The module terminates every line with a single carriage return.
pub const LINE_TERMINATOR: u8 = b'\r';

/// Buffers input and emits a line whenever the terminator is encountered.
///
/// Bytes with the high bit set are dropped, not appended: the FTDI bridge
/// occasionally injects noise on attach. Emitted lines are trimmed and never
/// contain the terminator. A partial line survives across `push` calls until
/// [`Framer::reset`] discards it.
pub struct LineFramer {
    buffer: String,
    terminator: u8,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::with_terminator(LINE_TERMINATOR)
    }

    pub fn with_terminator(terminator: u8) -> Self {
        Self {
            buffer: String::with_capacity(256),
            terminator,
        }
    }

    /// Bytes accumulated for the line in progress.
    pub fn pending(&self) -> &str {
        &self.buffer
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framer for LineFramer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();

        for &b in bytes {
            if b == self.terminator {
                lines.push(self.buffer.trim().to_string());
                self.buffer.clear();
            } else if b.is_ascii() {
                self.buffer.push(char::from(b));
            }
        }

        lines
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }

    fn encode(&self, command: &Command) -> Vec<u8> {
        let mut bytes = command.to_line().into_bytes();
        bytes.push(self.terminator);
        bytes
    }
}

/// Frame a command with the default terminator.
pub fn encode_command(command: &Command) -> Vec<u8> {
    LineFramer::new().encode(command)
}
