//! Error types for the multi-peer transfer engine.

use digc_core::NodeId;
use thiserror::Error;

/// Errors surfaced by a download and by the peer sessions it drives.
#[derive(Debug, Error)]
pub enum TransferError {
    /// A peer sent a malformed response or a chunk that failed validation.
    #[error("peer {0} misbehaved: {1}")]
    PeerMisbehavior(NodeId, String),

    /// The end-to-end SHA-256 did not match the expected content hash.
    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityFailed {
        /// Hex-encoded expected digest.
        expected: String,
        /// Hex-encoded actual digest.
        actual: String,
    },

    /// No peer responded to the metadata request.
    #[error("no peer responded to metadata request")]
    InsufficientPeers,

    /// A chunk exceeded its retry budget (`2 * peerCount` attempts).
    #[error("chunk {index} abandoned after {attempts} attempts")]
    ChunkAbandoned {
        /// The chunk that was abandoned.
        index: u64,
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// The download was cancelled, externally or via timeout.
    #[error("download cancelled")]
    Cancelled,

    /// A transient I/O or connection error occurred on a single attempt.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// Local file I/O failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A `digc-core` primitive rejected an input.
    #[error(transparent)]
    Core(#[from] digc_core::CoreError),
}
