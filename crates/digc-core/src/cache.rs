//! LRU peer cache keyed by info-hash, sized and aged per [`crate::config::NodeType`].

use std::time::{Duration, Instant};

use lru::LruCache;

use crate::ids::InfoHash;
use crate::model::PeerRecord;

struct CacheEntry {
    peers: Vec<PeerRecord>,
    inserted_at: Instant,
}

/// Bounded, TTL-aware peer cache. Capacity and TTL are fixed at
/// construction time, scaled by node type per spec §4.10.
pub struct PeerCache {
    inner: LruCache<InfoHash, CacheEntry>,
    ttl: Duration,
}

impl PeerCache {
    /// Create a cache holding up to `capacity` info-hashes, each entry
    /// expiring `ttl` after insertion.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = std::num::NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            inner: LruCache::new(capacity),
            ttl,
        }
    }

    /// Insert or replace the peer list cached for `hash`.
    pub fn put(&mut self, hash: InfoHash, peers: Vec<PeerRecord>) {
        self.inner.put(
            hash,
            CacheEntry {
                peers,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Fetch the cached peer list for `hash` if present and not expired.
    /// Touches the entry's recency on hit.
    pub fn get(&mut self, hash: &InfoHash) -> Option<&[PeerRecord]> {
        if let Some(entry) = self.inner.get(hash) {
            if entry.inserted_at.elapsed() > self.ttl {
                self.inner.pop(hash);
                return None;
            }
        }
        self.inner.get(hash).map(|e| e.peers.as_slice())
    }

    /// Number of cached info-hashes (including any not-yet-expired-but-stale
    /// ones).
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
