//! # Connection Actors
//!
//! The Melody Audio bridge: two actors behind one host handle.
//!
//! ## Actors
//!
//! - **ConnectionActor**: Owns the transport, runs discovery and reconnect,
//!   serializes writes
//! - **SessionActor**: Classifies response lines, correlates acknowledgements,
//!   tracks links and drives the [`MediaControlSink`]
//!
//! [`Bridge`] spawns both and is the only thing a host needs to hold.

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::todo
)]

pub mod bridge;
pub mod config;
pub mod connection_actor;
pub mod constants;
pub mod correlator;
mod discovery;
pub mod links;
pub mod session_actor;
pub mod sink;

pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use connection_actor::ConnectionActor;
pub use correlator::{CommandCorrelator, PendingCommand};
pub use links::{Link, LinkTable};
pub use session_actor::SessionActor;
pub use sink::{MediaControlSink, RecordingSink, SinkCall};
