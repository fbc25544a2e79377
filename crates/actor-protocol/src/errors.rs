//! Error Handling Guidelines
//!
//! Messages say what failed and, when known, why:
//!
//! - ✅ "Device 0403:6001 not found within 5000 ms"
//! - ✅ "Malformed ABS_VOL line 'ABS_VOL 2 loud': invalid volume 'loud'"
//! - ❌ "Error" (too vague)
//!
//! Only [`BridgeError::TransportIo`] is recovered automatically (by
//! reconnecting). Protocol-level variants are logged and absorbed.

use core_types::TransportError;
use decoders::ClassifyError;
use thiserror::Error;

/// Unified error type for bridge operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// No matching device appeared within the discovery timeout
    #[error("Device {device} not found within {timeout_ms} ms")]
    TransportUnavailable { device: String, timeout_ms: u64 },

    /// Access to the device was refused; needs a fresh open()
    #[error("Permission denied for device {0}")]
    PermissionDenied(String),

    /// Read, write or open failure on the transport
    #[error("Transport I/O error: {0}")]
    TransportIo(String),

    /// A known line category with a malformed field
    #[error("Protocol format error: {0}")]
    ProtocolFormat(String),

    /// Acknowledgement arrived with nothing pending
    #[error("Protocol desync: {0} with no pending command")]
    ProtocolDesync(String),

    /// No classification rule matched
    #[error("Unclassified line: '{0}'")]
    UnclassifiedLine(String),

    /// Communication channel closed
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// State transition was rejected
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<TransportError> for BridgeError {
    fn from(err: TransportError) -> Self {
        BridgeError::TransportIo(err.to_string())
    }
}

impl From<ClassifyError> for BridgeError {
    fn from(err: ClassifyError) -> Self {
        match err {
            ClassifyError::Format { .. } => BridgeError::ProtocolFormat(err.to_string()),
            ClassifyError::Unclassified(line) => BridgeError::UnclassifiedLine(line),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BridgeError::InvalidTransition("Disconnected → Connected".into());
        assert_eq!(
            err.to_string(),
            "Invalid state transition: Disconnected → Connected"
        );
    }

    #[test]
    fn test_unavailable_display() {
        let err = BridgeError::TransportUnavailable {
            device: "0403:6001".into(),
            timeout_ms: 5000,
        };
        assert_eq!(err.to_string(), "Device 0403:6001 not found within 5000 ms");
    }

    #[test]
    fn test_classify_errors_stay_distinct() {
        let format: BridgeError = ClassifyError::Format {
            category: "ABS_VOL",
            line: "ABS_VOL 2 loud".into(),
            reason: "invalid volume 'loud'".into(),
        }
        .into();
        assert!(matches!(format, BridgeError::ProtocolFormat(_)));

        let unclassified: BridgeError = ClassifyError::Unclassified("Ready".into()).into();
        assert_eq!(unclassified, BridgeError::UnclassifiedLine("Ready".into()));
    }

    #[test]
    fn test_transport_error_is_io() {
        let err: BridgeError = TransportError::NotConnected.into();
        assert_eq!(err, BridgeError::TransportIo("Not connected".into()));
    }
}
