//! Shared error types for the digcore workspace.

use thiserror::Error;

/// Errors surfaced by `digc-core` primitives (identifiers, registry, cache,
/// persistence).
#[derive(Debug, Error)]
pub enum CoreError {
    /// A fixed-size identifier did not decode to the expected byte length.
    #[error("invalid identifier length: expected {expected}, got {actual}")]
    InvalidIdLength {
        /// Expected byte length.
        expected: usize,
        /// Actual byte length received.
        actual: usize,
    },

    /// Hex decoding failed while parsing an identifier.
    #[error("invalid hex encoding: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Persisting or loading on-disk state failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    /// Stored state could not be deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration value was out of range or otherwise invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
