//! # digc-crypto
//!
//! Cryptographic primitives backing node identity and content integrity.
//!
//! This crate provides:
//! - Ed25519 node identity (signing/verifying keys, `NodeId` derivation)
//! - BLAKE3 hashing, tree hashing, and HKDF-style key derivation (internal
//!   chunk digests and DHT key derivation)
//! - SHA-256 content hashing (`ContentHash`, the identity exposed to
//!   callers and other tools)
//! - Constant-time comparison helpers
//! - Secure random number generation
//!
//! ## Cryptographic Suite
//!
//! | Function | Algorithm | Security Level |
//! |----------|-----------|----------------|
//! | Node identity / signatures | Ed25519 | 128-bit |
//! | Content hash | SHA-256 | 128-bit collision |
//! | Internal hash / KDF | BLAKE3 / HKDF-BLAKE3 | 128-bit |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constant_time;
pub mod error;
pub mod hash;
pub mod identity;
pub mod random;

pub use error::CryptoError;

/// Ed25519 public key size
pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;

/// Ed25519 secret key size
pub const ED25519_SECRET_KEY_SIZE: usize = 32;

/// Ed25519 signature size
pub const ED25519_SIGNATURE_SIZE: usize = 64;

/// BLAKE3 / SHA-256 output size
pub const HASH_OUTPUT_SIZE: usize = 32;

/// `NodeId` size, derived from a verifying key via [`identity::VerifyingKey::derive_node_id_bytes`].
pub const NODE_ID_SIZE: usize = 20;
