//! Node and content identifiers.
//!
//! `NodeId` and the XOR distance metric are adapted from the DHT identity
//! type the discovery crate already used, narrowed from a 256-bit BLAKE3
//! identifier to the 20-byte identifier this toolkit's wire format expects.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::CoreError;

/// A 20-byte node identifier.
///
/// Deterministically derived from a signing public key where authentication
/// is required (see `digc_crypto::identity::node_id_from_public_key`),
/// otherwise generated at random. Equality is byte-exact; ordering is
/// lexicographic; distance is bitwise XOR read as a big-endian integer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId([u8; 20]);

impl NodeId {
    /// Number of bits in a NodeId.
    pub const BITS: usize = 160;

    /// Wrap raw bytes as a NodeId.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Generate a cryptographically random NodeId.
    #[must_use]
    pub fn random() -> Self {
        let mut bytes = [0u8; 20];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes[..]);
        Self(bytes)
    }

    /// Parse a NodeId from its 40-character lowercase hex wire form.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 20] =
            bytes
                .try_into()
                .map_err(|v: Vec<u8>| CoreError::InvalidIdLength {
                    expected: 20,
                    actual: v.len(),
                })?;
        Ok(Self(arr))
    }

    /// Encode as 40-character lowercase hex, the canonical wire/disk form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// XOR distance to another NodeId, read as a big-endian 160-bit integer.
    #[must_use]
    pub fn distance(&self, other: &NodeId) -> NodeId {
        let mut out = [0u8; 20];
        for i in 0..20 {
            out[i] = self.0[i] ^ other.0[i];
        }
        NodeId(out)
    }

    /// Number of leading zero bits, used to place a node in a routing bucket.
    #[must_use]
    pub fn leading_zeros(&self) -> usize {
        let mut count = 0;
        for byte in &self.0 {
            if *byte == 0 {
                count += 8;
            } else {
                count += byte.leading_zeros() as usize;
                break;
            }
        }
        count.min(Self::BITS)
    }

    /// Bucket index of `self` relative to `local_id` (the position of the
    /// first differing bit in the XOR distance), or `None` if identical.
    #[must_use]
    pub fn bucket_index(&self, local_id: &NodeId) -> Option<usize> {
        let distance = self.distance(local_id);
        let leading = distance.leading_zeros();
        if leading == Self::BITS {
            None
        } else {
            Some(Self::BITS - 1 - leading)
        }
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", &self.to_hex()[..8])
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

/// A 32-byte SHA-256 digest of a complete file's bytes. Serves as the
/// verification identity for downloaded content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Wrap a raw SHA-256 digest.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse from 64-character lowercase hex.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] =
            bytes
                .try_into()
                .map_err(|v: Vec<u8>| CoreError::InvalidIdLength {
                    expected: 32,
                    actual: v.len(),
                })?;
        Ok(Self(arr))
    }

    /// Encode as 64-character lowercase hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Constant-time equality, to blunt timing oracles on stored hashes.
    #[must_use]
    pub fn ct_eq(&self, other: &ContentHash) -> bool {
        digc_crypto::constant_time::ct_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..8])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A human-readable opaque application-level name (at most 256 bytes) that
/// may be mapped to a [`ContentHash`]. Not cryptographically bound to the
/// content it names.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentId(String);

/// Maximum encoded length of a [`ContentId`], in bytes.
pub const CONTENT_ID_MAX_LEN: usize = 256;

impl ContentId {
    /// Construct a ContentId, rejecting names over [`CONTENT_ID_MAX_LEN`].
    pub fn new(value: impl Into<String>) -> Result<Self, CoreError> {
        let value = value.into();
        if value.len() > CONTENT_ID_MAX_LEN {
            return Err(CoreError::InvalidConfig(format!(
                "content id exceeds {CONTENT_ID_MAX_LEN} bytes"
            )));
        }
        Ok(Self(value))
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A discovery key: either a [`ContentHash`] or a legacy 20-byte SHA-1
/// info-hash. Both forms are accepted in discovery and normalized to hex
/// for keying.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InfoHash {
    /// Modern 32-byte SHA-256 content hash.
    Sha256([u8; 32]),
    /// Legacy 20-byte SHA-1 info-hash, accepted for interoperability.
    Sha1([u8; 20]),
}

impl InfoHash {
    /// Build an InfoHash from a [`ContentHash`].
    #[must_use]
    pub fn from_content_hash(hash: ContentHash) -> Self {
        InfoHash::Sha256(*hash.as_bytes())
    }

    /// Parse from hex; 64 chars decode as SHA-256, 40 chars as legacy SHA-1.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s)?;
        match bytes.len() {
            32 => {
                let arr: [u8; 32] = bytes.try_into().expect("checked len");
                Ok(InfoHash::Sha256(arr))
            }
            20 => {
                let arr: [u8; 20] = bytes.try_into().expect("checked len");
                Ok(InfoHash::Sha1(arr))
            }
            actual => Err(CoreError::InvalidIdLength {
                expected: 32,
                actual,
            }),
        }
    }

    /// Normalize to lowercase hex for use as an overlay/storage key.
    #[must_use]
    pub fn to_hex(&self) -> String {
        match self {
            InfoHash::Sha256(b) => hex::encode(b),
            InfoHash::Sha1(b) => hex::encode(b),
        }
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InfoHash({})", self.to_hex())
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
