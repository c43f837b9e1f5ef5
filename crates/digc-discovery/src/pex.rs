//! Peer Exchange: connected peers trade lists of other peers they know
//! about for shared content, bypassing the DHT or overlay entirely.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use digc_core::ids::{InfoHash, NodeId};
use digc_core::model::{PeerCapabilities, PeerRecord, PeerSource};

use crate::error::DiscoveryError;
use crate::overlay::SharedOverlay;

/// Maximum entries retained in the exchange cache.
pub const MAX_PEX_ENTRIES: usize = 200;

/// How long an entry survives without a refresh.
pub const PEX_ENTRY_EXPIRY: Duration = Duration::from_secs(30 * 60);

/// Default interval between outgoing ADD_PEERS announcements.
pub const DEFAULT_PEX_INTERVAL: Duration = Duration::from_secs(60);

/// One peer exchange message, published at
/// `pex/messages/<selfId>_<timestamp>`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PexMessage {
    /// The node announcing this message.
    pub from: NodeId,
    /// Address of `from`.
    pub address: IpAddr,
    /// Port of `from`.
    pub port: u16,
    /// Content hashes `from` is currently serving.
    pub info_hashes: Vec<InfoHash>,
    /// Advertised capability flags.
    pub flags: PeerCapabilities,
    /// True if this message asks peers to forget `from`, rather than learn
    /// it (`REMOVE_PEERS`).
    pub remove: bool,
}

struct CacheEntry {
    peer: PeerRecord,
    info_hashes: Vec<InfoHash>,
    capabilities: PeerCapabilities,
    inserted_at: SystemTime,
}

/// Tracks peers learned through exchange with already-connected peers.
pub struct PexManager {
    local_id: NodeId,
    overlay: SharedOverlay,
    cache: std::sync::Mutex<HashMap<(IpAddr, u16), CacheEntry>>,
    connected: std::sync::Mutex<std::collections::HashSet<(IpAddr, u16)>>,
}

impl PexManager {
    /// Create a manager for `local_id`, publishing and reading through
    /// `overlay`.
    #[must_use]
    pub fn new(local_id: NodeId, overlay: SharedOverlay) -> Self {
        Self {
            local_id,
            overlay,
            cache: std::sync::Mutex::new(HashMap::new()),
            connected: std::sync::Mutex::new(std::collections::HashSet::new()),
        }
    }

    /// Mark `(address, port)` as currently connected, exempting it from
    /// expiry-driven cleanup.
    pub fn mark_connected(&self, address: IpAddr, port: u16) {
        self.connected.lock().unwrap().insert((address, port));
    }

    /// Clear a peer's connected-exemption, letting normal expiry apply.
    pub fn mark_disconnected(&self, address: IpAddr, port: u16) {
        self.connected.lock().unwrap().remove(&(address, port));
    }

    /// Publish an ADD_PEERS announcement describing this node.
    pub async fn announce(
        &self,
        address: IpAddr,
        port: u16,
        info_hashes: Vec<InfoHash>,
        flags: PeerCapabilities,
    ) -> Result<(), DiscoveryError> {
        self.publish(address, port, info_hashes, flags, false).await
    }

    /// Publish a REMOVE_PEERS announcement asking peers to forget this
    /// node.
    pub async fn withdraw(&self, address: IpAddr, port: u16) -> Result<(), DiscoveryError> {
        self.publish(address, port, Vec::new(), PeerCapabilities::default(), true)
            .await
    }

    async fn publish(
        &self,
        address: IpAddr,
        port: u16,
        info_hashes: Vec<InfoHash>,
        flags: PeerCapabilities,
        remove: bool,
    ) -> Result<(), DiscoveryError> {
        let message = PexMessage {
            from: self.local_id,
            address,
            port,
            info_hashes,
            flags,
            remove,
        };
        let timestamp = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let path = format!("pex/messages/{}_{timestamp}", self.local_id.to_hex());
        self.overlay.put(&path, serde_json::to_vec(&message)?).await?;
        Ok(())
    }

    /// Absorb a received [`PexMessage`] into the local cache, applying the
    /// `(address, port)`/NodeId dedup key and the bounded-size eviction
    /// policy.
    pub fn ingest(&self, message: PexMessage) {
        if message.from == self.local_id {
            return;
        }
        let key = (message.address, message.port);
        let mut cache = self.cache.lock().unwrap();

        if message.remove {
            cache.remove(&key);
            return;
        }

        let mut peer = PeerRecord::new(Some(message.from), message.address, message.port, PeerSource::Pex, 0.5);
        peer.capabilities = message.flags;
        cache.insert(
            key,
            CacheEntry {
                peer,
                info_hashes: message.info_hashes,
                capabilities: message.flags,
                inserted_at: SystemTime::now(),
            },
        );

        if cache.len() > MAX_PEX_ENTRIES {
            let connected = self.connected.lock().unwrap();
            if let Some(victim) = cache
                .iter()
                .filter(|(k, _)| !connected.contains(k))
                .min_by_key(|(_, v)| v.inserted_at)
                .map(|(k, _)| *k)
            {
                cache.remove(&victim);
            }
        }
    }

    /// Remove cache entries past [`PEX_ENTRY_EXPIRY`], except those
    /// currently marked connected.
    pub fn cleanup_expired(&self) {
        let connected = self.connected.lock().unwrap();
        self.cache.lock().unwrap().retain(|key, entry| {
            connected.contains(key)
                || entry.inserted_at.elapsed().unwrap_or(Duration::MAX) <= PEX_ENTRY_EXPIRY
        });
    }

    /// Peers advertising `hash` with at least the given `required` flags
    /// set. A required flag must be `true` on the candidate if `true` in
    /// `required`; unset required flags impose no constraint.
    #[must_use]
    pub fn find_peers_with_capabilities(
        &self,
        hash: InfoHash,
        required: PeerCapabilities,
    ) -> Vec<PeerRecord> {
        self.cache
            .lock()
            .unwrap()
            .values()
            .filter(|entry| entry.info_hashes.iter().any(|h| hashes_eq(h, &hash)))
            .filter(|entry| capabilities_satisfy(&entry.capabilities, &required))
            .map(|entry| entry.peer.clone())
            .collect()
    }

    /// Number of cached peer entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    /// True if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.lock().unwrap().is_empty()
    }
}

fn hashes_eq(a: &InfoHash, b: &InfoHash) -> bool {
    a.to_hex() == b.to_hex()
}

fn capabilities_satisfy(candidate: &PeerCapabilities, required: &PeerCapabilities) -> bool {
    (!required.prefer_encryption || candidate.prefer_encryption)
        && (!required.can_use_utp || candidate.can_use_utp)
        && (!required.is_reachable || candidate.is_reachable)
        && (!required.supports_net_crypto || candidate.supports_net_crypto)
}

/// Socket address helper for constructing test fixtures and log lines.
#[must_use]
pub fn socket_addr(address: IpAddr, port: u16) -> SocketAddr {
    SocketAddr::new(address, port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::InMemoryOverlay;
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    fn overlay() -> SharedOverlay {
        Arc::new(InMemoryOverlay::new())
    }

    #[test]
    fn ingest_ignores_self_announcements() {
        let id = NodeId::random();
        let manager = PexManager::new(id, overlay());
        manager.ingest(PexMessage {
            from: id,
            address: IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)),
            port: 100,
            info_hashes: vec![],
            flags: PeerCapabilities::default(),
            remove: false,
        });
        assert!(manager.is_empty());
    }

    #[test]
    fn ingest_then_remove_clears_entry() {
        let manager = PexManager::new(NodeId::random(), overlay());
        let from = NodeId::random();
        let addr = IpAddr::V4(Ipv4Addr::new(5, 6, 7, 8));
        manager.ingest(PexMessage {
            from,
            address: addr,
            port: 200,
            info_hashes: vec![],
            flags: PeerCapabilities::default(),
            remove: false,
        });
        assert_eq!(manager.len(), 1);

        manager.ingest(PexMessage {
            from,
            address: addr,
            port: 200,
            info_hashes: vec![],
            flags: PeerCapabilities::default(),
            remove: true,
        });
        assert!(manager.is_empty());
    }

    #[test]
    fn find_peers_with_capabilities_filters_by_hash_and_flags() {
        let manager = PexManager::new(NodeId::random(), overlay());
        let hash = InfoHash::from_hex(&"aa".repeat(32)).unwrap();
        let mut flags = PeerCapabilities::default();
        flags.supports_net_crypto = true;

        manager.ingest(PexMessage {
            from: NodeId::random(),
            address: IpAddr::V4(Ipv4Addr::new(9, 9, 9, 9)),
            port: 300,
            info_hashes: vec![hash],
            flags,
            remove: false,
        });

        let mut required = PeerCapabilities::default();
        required.supports_net_crypto = true;
        let found = manager.find_peers_with_capabilities(hash, required);
        assert_eq!(found.len(), 1);

        let mut unmet = PeerCapabilities::default();
        unmet.can_use_utp = true;
        assert!(manager.find_peers_with_capabilities(hash, unmet).is_empty());
    }

    #[test]
    fn cleanup_expired_keeps_connected_peers() {
        let manager = PexManager::new(NodeId::random(), overlay());
        let addr = IpAddr::V4(Ipv4Addr::new(2, 2, 2, 2));
        manager.ingest(PexMessage {
            from: NodeId::random(),
            address: addr,
            port: 400,
            info_hashes: vec![],
            flags: PeerCapabilities::default(),
            remove: false,
        });
        manager.mark_connected(addr, 400);
        manager.cleanup_expired();
        assert_eq!(manager.len(), 1);
    }
}
