use actor_protocol::BridgeError;
use core_types::DeviceDescriptor;
use serde::Deserialize;

use crate::constants;

/// Runtime configuration for [`crate::Bridge`]
///
/// Every field has a default, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Serial adapter to look for
    pub device: DeviceDescriptor,
    pub baud_rate: u32,
    pub discovery_timeout_ms: u64,
    pub discovery_poll_ms: u64,
    pub settle_delay_ms: u64,
    pub permission_poll_ms: u64,
    /// Replace the current link when a different link id shows up
    pub single_link: bool,
    pub max_buffered_media: usize,
    pub channel_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            device: DeviceDescriptor::new(constants::device::VENDOR_ID, constants::device::PRODUCT_ID),
            baud_rate: constants::device::BAUD_RATE,
            discovery_timeout_ms: constants::discovery::TIMEOUT_MS,
            discovery_poll_ms: constants::discovery::POLL_MS,
            settle_delay_ms: constants::discovery::SETTLE_DELAY_MS,
            permission_poll_ms: constants::discovery::PERMISSION_POLL_MS,
            single_link: false,
            max_buffered_media: constants::session::MAX_BUFFERED_MEDIA,
            channel_capacity: constants::channels::CAPACITY,
        }
    }
}

impl BridgeConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self, BridgeError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| BridgeError::Config(format!("Invalid bridge config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.discovery_timeout_ms == 0 {
            return Err(BridgeError::Config(
                "discovery_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.discovery_poll_ms == 0 || self.permission_poll_ms == 0 {
            return Err(BridgeError::Config(
                "poll intervals must be greater than 0".into(),
            ));
        }
        if self.max_buffered_media == 0 {
            return Err(BridgeError::Config(
                "max_buffered_media must be greater than 0".into(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(BridgeError::Config(
                "channel_capacity must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        let config = BridgeConfig::from_json_str("{}").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.device, DeviceDescriptor::FTDI_FT232);
        assert_eq!(config.discovery_timeout_ms, 5000);
        assert_eq!(config.settle_delay_ms, 500);
        assert_eq!(config.max_buffered_media, 2);
    }

    #[test]
    fn test_partial_override() {
        let config = BridgeConfig::from_json_str(
            r#"{"device":{"vendor_id":4292,"product_id":60000},"single_link":true}"#,
        )
        .unwrap();
        assert_eq!(config.device, DeviceDescriptor::new(0x10C4, 0xEA60));
        assert!(config.single_link);
        assert_eq!(config.baud_rate, 115_200);
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let err = BridgeConfig::from_json_str(r#"{"discovery_timeout_ms":0}"#).unwrap_err();
        assert!(matches!(err, BridgeError::Config(msg) if msg.contains("discovery_timeout_ms")));
    }

    #[test]
    fn test_rejects_zero_media_buffer() {
        assert!(BridgeConfig::from_json_str(r#"{"max_buffered_media":0}"#).is_err());
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = BridgeConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }
}
