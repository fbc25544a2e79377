//! Turns trimmed response lines into [`ProtocolEvent`]s.
//!
//! The classifier never panics on input. A line either produces an event,
//! fails with [`ClassifyError::Format`] (a known category with a malformed
//! field), or is reported as [`ClassifyError::Unclassified`].

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::todo
)]

use thiserror::Error;

mod fields;
pub mod melody;

pub use melody::{keys, ResponseClassifier};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    /// Line matched a category but a field could not be parsed.
    #[error("Malformed {category} line '{line}': {reason}")]
    Format {
        category: &'static str,
        line: String,
        reason: String,
    },

    /// No rule matched.
    #[error("Unclassified line: '{0}'")]
    Unclassified(String),
}
