//! Logging macros shared by every actor
//!
//! Thin wrappers over `tracing`. Events are emitted with the calling
//! module as target, so `RUST_LOG=connection_actors=debug` narrows output
//! to the bridge actors.

/// Per-message detail: stale results, ignored lines, routing decisions
///
/// # Example
/// ```
/// use actor_runtime::actor_debug;
/// actor_debug!("Dropping stale discovery result (attempt {}, current {})", 3, 4);
/// ```
#[macro_export]
macro_rules! actor_debug {
    ($($arg:tt)*) => {
        $crate::__tracing::debug!($($arg)*)
    };
}

/// State transitions and link lifecycle
#[macro_export]
macro_rules! actor_info {
    ($($arg:tt)*) => {
        $crate::__tracing::info!($($arg)*)
    };
}

/// Absorbed failures: desync, malformed lines, failed writes
#[macro_export]
macro_rules! actor_warn {
    ($($arg:tt)*) => {
        $crate::__tracing::warn!($($arg)*)
    };
}

/// An actor could not start
#[macro_export]
macro_rules! actor_error {
    ($($arg:tt)*) => {
        $crate::__tracing::error!($($arg)*)
    };
}
