//! Centralized configuration constants for the bridge actors
//!
//! These are the defaults behind [`crate::BridgeConfig`]. Values come from
//! observed behaviour of FTDI-bridged Melody Audio modules.

/// Serial adapter defaults
pub mod device {
    /// FTDI FT232 vendor id (0x0403)
    pub const VENDOR_ID: u16 = 1027;

    /// FTDI FT232 product id (0x6001)
    pub const PRODUCT_ID: u16 = 24577;

    /// Module UART speed
    ///
    /// **Value**: 115200 baud, 8N1
    ///
    /// **Rationale**: Factory default of Melody firmware. Changing it needs a
    /// `SET UART_CONFIG` on the module first.
    pub const BAUD_RATE: u32 = 115_200;
}

/// Discovery and reconnect timing
pub mod discovery {
    /// Wall-clock bound for one discovery attempt (milliseconds)
    ///
    /// **Value**: 5000ms
    ///
    /// **Rationale**: USB re-enumeration of an FTDI bridge after a replug
    /// takes 200-1500ms. 5s covers slow hubs without leaving the host
    /// waiting long for an adapter that is really gone.
    ///
    /// **Trade-offs**:
    /// - Shorter: reconnect after a brown-out reports failure too early
    /// - Longer: `open()` with no adapter plugged in feels hung
    pub const TIMEOUT_MS: u64 = 5000;

    /// Presence poll interval (milliseconds)
    ///
    /// **Value**: 50ms
    ///
    /// **Rationale**: Also the cancellation granularity: `close()` stops
    /// a discovery attempt within one poll.
    pub const POLL_MS: u64 = 50;

    /// Delay between detach and re-discovery (milliseconds)
    ///
    /// **Value**: 500ms
    ///
    /// **Rationale**: Only applied when the link was Connected. The driver
    /// still reports the old device node for a short while after a detach;
    /// polling immediately finds the stale node and the open fails.
    pub const SETTLE_DELAY_MS: u64 = 500;

    /// How often a pending permission request checks for cancellation
    /// (milliseconds)
    pub const PERMISSION_POLL_MS: u64 = 50;
}

/// Session bookkeeping limits
pub mod session {
    /// Link-less `AVRCP_MEDIA` events kept while no link is playing
    ///
    /// **Value**: 2
    ///
    /// **Rationale**: A track change emits TITLE then ARTIST/ALBUM in quick
    /// succession; older entries are superseded by the STATUS refresh.
    pub const MAX_BUFFERED_MEDIA: usize = 2;
}

/// Channel sizing
pub mod channels {
    /// Capacity of every actor inbox and the host event channel
    ///
    /// **Value**: 256
    ///
    /// **Rationale**: At 115200 baud the module produces well under 1000
    /// lines per second; 256 slots absorb a phonebook pull burst.
    pub const CAPACITY: usize = 256;
}

/// Bound on how long [`crate::Bridge::shutdown`] waits for the transport to
/// close before stopping the actors (milliseconds)
pub const SHUTDOWN_TIMEOUT_MS: u64 = 1000;
