use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("IO Error: {0}")]
    Io(String),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Not connected")]
    NotConnected,
    #[error("Transport closed")]
    Closed,
    #[error("Other: {0}")]
    Other(String),
}

/// USB identity of the serial adapter the module sits behind.
///
/// Fixed for the lifetime of a bridge; detach signals for any other device
/// are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceDescriptor {
    /// FTDI FT232 defaults used by the Melody Audio breakout boards.
    pub const FTDI_FT232: Self = Self::new(1027, 24577);

    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }

    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id == vendor_id && self.product_id == product_id
    }
}

impl Default for DeviceDescriptor {
    fn default() -> Self {
        Self::FTDI_FT232
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}:{:04X}", self.vendor_id, self.product_id)
    }
}

/// Answer to a permission request. Delivered exactly once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    Granted,
    Denied,
}

/// Byte-level serial transport (USB-CDC / FTDI class).
///
/// Methods take `&self` because the reader task and the writer run
/// concurrently against one shared transport; implementations use interior
/// mutability. `read_chunk` must return `Err` once the transport is closed
/// or the device is gone so the reader task can exit.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Is a device matching `device` currently enumerated?
    async fn is_device_present(&self, device: &DeviceDescriptor) -> bool;

    /// Has the host already granted access to `device`?
    async fn has_permission(&self, device: &DeviceDescriptor) -> bool;

    /// Ask the host for access. May suspend until an external grant/deny.
    async fn request_permission(&self, device: &DeviceDescriptor) -> Permission;

    /// Open the device at the given baud rate.
    async fn open(&self, device: &DeviceDescriptor, baud_rate: u32) -> Result<(), TransportError>;

    /// Read the next chunk of bytes, waiting until some are available.
    async fn read_chunk(&self) -> Result<Vec<u8>, TransportError>;

    /// Write bytes to the transport.
    async fn write(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Close the connection.
    async fn close(&self) -> Result<(), TransportError>;
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_display_is_hex() {
        assert_eq!(DeviceDescriptor::FTDI_FT232.to_string(), "0403:6001");
    }

    #[test]
    fn test_descriptor_matches() {
        let d = DeviceDescriptor::new(0x1234, 0x5678);
        assert!(d.matches(0x1234, 0x5678));
        assert!(!d.matches(0x1234, 0x0000));
    }

    #[test]
    fn test_descriptor_deserializes_from_config() {
        let d: DeviceDescriptor =
            serde_json::from_str(r#"{"vendor_id":1027,"product_id":24577}"#).unwrap();
        assert_eq!(d, DeviceDescriptor::default());
    }
}
