//! # Error Types
//!
//! Errors raised while constructing core values. Pipeline, codec, and
//! evaluator failures live in their own crates; this enum only covers the
//! primitives defined here.

use thiserror::Error;

/// Error constructing or parsing a core value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KycError {
    /// A case name failed validation.
    #[error("invalid case name {name:?}: {reason}")]
    InvalidCaseName {
        /// The rejected input.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A case status string is not one of `pending`, `complete`, `failed`.
    #[error("unknown case status {0:?}")]
    InvalidStatus(String),

    /// A timestamp could not be parsed or is not UTC.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
