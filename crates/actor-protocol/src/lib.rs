//! # Actor Protocol
//!
//! Type-safe message definitions for the Melody bridge actor system.
//!
//! This crate has no runtime dependencies (no tokio, no transport), so the
//! state machine and message types are testable on their own.
//!
//! ## Architecture
//!
//! - **SystemEvent**: Messages from Actor System → host
//! - **MediaIntent**: Messages from host media controls → Session actor
//! - **ConnectionState**: FSM state machine (pure logic, no side effects)
//!
//! ## Message Flow
//!
//! ```text
//! Host → open/close → ConnectionActor → lines → SessionActor → MediaControlSink
//!                          ↓                        ↓
//!                     SystemEvent              SystemEvent
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::todo
)]

pub mod errors;
pub mod messages;
pub mod state;

pub use errors::BridgeError;
pub use messages::{
    CommandOutcome, Focus, MediaAction, MediaIntent, MediaMetadata, PlaybackState, SystemEvent,
};
pub use state::ConnectionState;
