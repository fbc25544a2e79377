//! # Actor Runtime
//!
//! Provides the runtime infrastructure for the Melody bridge actor system.
//!
//! Two actors run the bridge: one owns the transport, one owns the
//! protocol session. Each owns its state outright and only sees it change
//! through its inbox, which is what makes the line codec and the command
//! correlator safe without locks.
//!
//! This crate has the pieces they share:
//! - [`Actor`] and [`spawn_actor`]
//! - [`ChannelManager`] and the message enums of both inboxes
//! - [`CancelFlag`] for cooperative cancellation of discovery
//! - [`spawn_delayed`] for the post-detach settle timer
//! - `actor_*!` logging macros over `tracing`
//!
//! ## Example
//!
//! ```ignore
//! use actor_runtime::{spawn_actor, ChannelManager};
//!
//! let (manager, handles) = ChannelManager::new(256);
//! spawn_actor(connection_actor, handles.connection_rx, handles.event_tx.clone());
//! manager.send_connection(ConnectionMessage::Open)?;
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::todo
)]

pub mod actor;
pub mod cancellation;
pub mod channels;
pub mod logging;
pub mod supervision;

pub use actor::{spawn_actor, Actor};
pub use cancellation::{race_with_cancellation, CancelFlag, DEFAULT_CANCEL_POLL_MS};
pub use channels::{
    ActorHandles, ChannelManager, ConnectionMessage, DiscoveryOutcome, ListenerId,
    SessionMessage,
};
pub use supervision::{spawn_delayed, TimeoutHandle};

#[doc(hidden)]
pub use tracing as __tracing;
