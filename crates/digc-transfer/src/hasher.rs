//! Chunk and whole-file hashing.
//!
//! Per-chunk integrity uses BLAKE3, matching [`crate::chunker::ChunkInfo`].
//! End-to-end content identity uses SHA-256, matching
//! [`digc_core::ContentHash`]; the transfer engine computes this one
//! incrementally as chunks land in index order rather than re-hashing the
//! whole file, but this one-shot form is useful for verifying a file
//! already on disk.

use sha2::{Digest, Sha256};

use digc_core::ContentHash;

/// Hash a chunk and return a truncated BLAKE3 digest.
#[must_use]
pub fn hash_chunk(data: &[u8]) -> [u8; 16] {
    let hash = blake3::hash(data);
    let mut truncated = [0u8; 16];
    truncated.copy_from_slice(&hash.as_bytes()[..16]);
    truncated
}

/// Verify a chunk against its expected truncated BLAKE3 digest.
#[must_use]
pub fn verify_chunk(data: &[u8], expected: &[u8; 16]) -> bool {
    hash_chunk(data) == *expected
}

/// Compute the SHA-256 [`ContentHash`] of an entire file's bytes.
#[must_use]
pub fn hash_file_sha256(data: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    ContentHash::from_bytes(hasher.finalize().into())
}
