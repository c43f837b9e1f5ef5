//! Cryptographic error types.

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Signature did not verify against the given message and public key.
    #[error("invalid signature")]
    InvalidSignature,

    /// Bytes do not decode to a valid Ed25519 public key point.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// A fixed-size key or digest was built from the wrong number of bytes.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// The OS CSPRNG failed to fill a buffer.
    #[error("random number generation failed")]
    RandomFailed,
}
