//! A distributed hash table expressed as a flat routing map published over
//! the signaling overlay, rather than classic Kademlia RPC over raw UDP.
//!
//! Every node publishes its own liveness at `routing/<nodeId>` and
//! subscribes to `routing/*`, building up a local view of the network. A
//! search for content peers publishes (or reads) `content/<infoHash>/<nodeId>`
//! entries. There are no buckets: the table is a single map with a soft
//! capacity of `K * 20`, and the oldest entry by `last_seen` is evicted once
//! that cap is exceeded.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use digc_core::config::NodeType;
use digc_core::ids::{InfoHash, NodeId};
use digc_core::model::{PeerRecord, PeerSource};

use crate::error::DiscoveryError;
use crate::overlay::SharedOverlay;

/// Number of closest nodes returned by [`DhtTable::find_node`], and the
/// divisor of the routing table's soft capacity (`K * 20`).
pub const K: usize = 8;

/// Soft cap on the number of entries held in the routing table.
pub const ROUTING_TABLE_CAP: usize = K * 20;

/// How long a `content/<infoHash>/<nodeId>` entry is considered fresh.
pub const CONTENT_ENTRY_TTL: Duration = Duration::from_secs(30 * 60);

/// Default re-announce interval for [`DhtTable::announce`].
pub const DEFAULT_ANNOUNCE_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Deadline for a one-shot `content/<infoHash>` peer search.
pub const FIND_PEERS_DEADLINE: Duration = Duration::from_secs(2);

/// One entry in the flat routing table: a node's last advertised address.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DhtNode {
    /// The node's identity.
    pub node_id: NodeId,
    /// Its advertised address.
    pub address: IpAddr,
    /// Its advertised port.
    pub port: u16,
    /// When this entry was last refreshed.
    #[serde(with = "system_time_secs")]
    pub last_seen: SystemTime,
    /// The node's self-reported tier.
    pub node_type: NodeType,
}

impl DhtNode {
    /// Socket address for this entry.
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

/// Wire form published at `content/<infoHash>/<nodeId>`.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct ContentEntry {
    address: IpAddr,
    port: u16,
    #[serde(with = "system_time_secs")]
    timestamp: SystemTime,
}

mod system_time_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S: Serializer>(value: &SystemTime, s: S) -> Result<S::Ok, S::Error> {
        let secs = value
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        secs.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<SystemTime, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(UNIX_EPOCH + Duration::from_secs(secs))
    }
}

/// Validate a node-id candidate's wire form: 40 lowercase hex characters
/// and a non-unspecified address.
fn validate_candidate(node_id_hex: &str, address: IpAddr, port: u16) -> Result<NodeId, DiscoveryError> {
    if node_id_hex.len() != 40 || !node_id_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(DiscoveryError::InvalidIdentifier(format!(
            "expected 40 hex chars, got {node_id_hex:?}"
        )));
    }
    if address.is_unspecified() || port == 0 {
        return Err(DiscoveryError::InvalidAddress(format!("{address}:{port}")));
    }
    NodeId::from_hex(node_id_hex).map_err(|e| DiscoveryError::InvalidIdentifier(e.to_string()))
}

/// The flat-map routing table, published and discovered over an
/// [`OverlayClient`](crate::overlay::OverlayClient).
pub struct DhtTable {
    local_id: NodeId,
    local_type: NodeType,
    overlay: SharedOverlay,
    nodes: RwLock<HashMap<NodeId, DhtNode>>,
}

impl DhtTable {
    /// Construct an empty table for `local_id`, backed by `overlay`.
    #[must_use]
    pub fn new(local_id: NodeId, local_type: NodeType, overlay: SharedOverlay) -> Self {
        Self {
            local_id,
            local_type,
            overlay,
            nodes: RwLock::new(HashMap::new()),
        }
    }

    /// Publish this node's own routing entry under `routing/<nodeId>`.
    pub async fn publish_self(&self, address: IpAddr, port: u16) -> Result<(), DiscoveryError> {
        let self_entry = DhtNode {
            node_id: self.local_id,
            address,
            port,
            last_seen: SystemTime::now(),
            node_type: self.local_type,
        };
        let path = format!("routing/{}", self.local_id.to_hex());
        let payload = serde_json::to_vec(&self_entry)?;
        self.overlay.put(&path, payload).await?;
        Ok(())
    }

    /// Subscribe to `routing/*` and absorb every advertised entry into the
    /// local table until `budget` elapses. Intended to run as a background
    /// task alongside periodic [`Self::publish_self`] calls.
    pub async fn absorb_routing_updates(&self, budget: Duration) -> Result<usize, DiscoveryError> {
        let mut rx = self.overlay.subscribe("routing/").await?;
        let deadline = tokio::time::Instant::now() + budget;
        let mut absorbed = 0;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            let Ok(Some(event)) = tokio::time::timeout(remaining, rx.recv()).await else {
                break;
            };
            let Some(node_hex) = event.path.strip_prefix("routing/") else {
                continue;
            };
            let Ok(node) = serde_json::from_slice::<DhtNode>(&event.value) else {
                continue;
            };
            if self
                .insert_candidate(node_hex, node.address, node.port, node.node_type)
                .await
                .is_ok()
            {
                absorbed += 1;
            }
        }

        Ok(absorbed)
    }

    /// Insert or refresh a candidate entry, validating its wire form and
    /// enforcing the soft capacity via oldest-`last_seen` eviction.
    pub async fn insert_candidate(
        &self,
        node_id_hex: &str,
        address: IpAddr,
        port: u16,
        node_type: NodeType,
    ) -> Result<(), DiscoveryError> {
        let node_id = validate_candidate(node_id_hex, address, port)?;
        if node_id == self.local_id {
            return Ok(());
        }

        let entry = DhtNode {
            node_id,
            address,
            port,
            last_seen: SystemTime::now(),
            node_type,
        };

        let mut nodes = self.nodes.write().await;
        nodes.insert(node_id, entry);
        if nodes.len() > ROUTING_TABLE_CAP {
            if let Some(oldest) = nodes
                .values()
                .min_by_key(|n| n.last_seen)
                .map(|n| n.node_id)
            {
                nodes.remove(&oldest);
            }
        }
        Ok(())
    }

    /// Current number of entries held locally.
    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    /// True if the local table is empty.
    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }

    /// The `K` entries closest to `target` by XOR distance.
    pub async fn find_node(&self, target: &NodeId) -> Vec<DhtNode> {
        let nodes = self.nodes.read().await;
        let mut candidates: Vec<&DhtNode> = nodes.values().collect();
        candidates.sort_by_key(|n| n.node_id.distance(target));
        candidates.into_iter().take(K).cloned().collect()
    }

    /// Publish this node as a holder of `hash`, listening on `port`, and
    /// repeat every `interval` until `stop` resolves. `shard_prefixes`
    /// restricts announcement to info-hashes whose hex form starts with one
    /// of the given prefixes; an empty list announces everything.
    pub async fn announce(
        self: Arc<Self>,
        hash: InfoHash,
        address: IpAddr,
        port: u16,
        interval: Duration,
        shard_prefixes: Vec<String>,
    ) -> Result<(), DiscoveryError> {
        let hex = hash.to_hex();
        if !shard_prefixes.is_empty() && !shard_prefixes.iter().any(|p| hex.starts_with(p.as_str())) {
            return Ok(());
        }

        loop {
            let path = format!("content/{hex}/{}", self.local_id.to_hex());
            let entry = ContentEntry {
                address,
                port,
                timestamp: SystemTime::now(),
            };
            let payload = serde_json::to_vec(&entry)?;
            self.overlay.put(&path, payload).await?;
            tokio::time::sleep(interval).await;
        }
    }

    /// Find up to `max_peers` holders of `hash`: reads any entries already
    /// published under `content/<hash>/`, then (if the overlay supports a
    /// one-shot subscription) waits briefly for fresh ones, filtering out
    /// this node and stale entries.
    pub async fn find_peers(
        &self,
        hash: InfoHash,
        max_peers: usize,
    ) -> Result<Vec<PeerRecord>, DiscoveryError> {
        let prefix = format!("content/{}/", hash.to_hex());
        let mut rx = self.overlay.subscribe(&prefix).await?;
        let deadline = tokio::time::Instant::now() + FIND_PEERS_DEADLINE;

        let mut peers = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() || peers.len() >= max_peers {
                break;
            }
            let Ok(Some(event)) = tokio::time::timeout(remaining, rx.recv()).await else {
                break;
            };
            let Some(node_hex) = event.path.strip_prefix(&prefix) else {
                continue;
            };
            if node_hex == self.local_id.to_hex() {
                continue;
            }
            let Ok(entry) = serde_json::from_slice::<ContentEntry>(&event.value) else {
                continue;
            };
            if entry.timestamp.elapsed().unwrap_or(Duration::MAX) > CONTENT_ENTRY_TTL {
                continue;
            }
            peers.push(PeerRecord::new(
                NodeId::from_hex(node_hex).ok(),
                entry.address,
                entry.port,
                PeerSource::Dht,
                0.6,
            ));
        }

        Ok(peers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::InMemoryOverlay;
    use std::net::Ipv4Addr;

    fn localhost(port: u16) -> (IpAddr, u16) {
        (IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
    }

    #[test]
    fn validate_candidate_rejects_short_hex() {
        let err = validate_candidate("abc", IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)), 80);
        assert!(err.is_err());
    }

    #[test]
    fn validate_candidate_rejects_unspecified_address() {
        let hex = "a".repeat(40);
        let err = validate_candidate(&hex, IpAddr::V4(Ipv4Addr::UNSPECIFIED), 80);
        assert!(err.is_err());
    }

    #[test]
    fn validate_candidate_accepts_well_formed_input() {
        let hex = "b".repeat(40);
        let (addr, port) = localhost(6881);
        assert!(validate_candidate(&hex, addr, port).is_ok());
    }

    #[tokio::test]
    async fn insert_and_find_node_orders_by_xor_distance() {
        let overlay: SharedOverlay = Arc::new(InMemoryOverlay::new());
        let local = NodeId::random();
        let table = DhtTable::new(local, NodeType::Standard, overlay);

        for i in 0u8..5 {
            let hex = format!("{:02x}", i).repeat(20);
            let (addr, port) = localhost(7000 + u16::from(i));
            table
                .insert_candidate(&hex, addr, port, NodeType::Standard)
                .await
                .unwrap();
        }

        assert_eq!(table.len().await, 5);
        let target = NodeId::from_hex(&"00".repeat(20)).unwrap();
        let closest = table.find_node(&target).await;
        assert!(closest.len() <= K);
        assert!(closest.windows(2).all(|w| w[0].node_id.distance(&target)
            <= w[1].node_id.distance(&target)));
    }

    #[tokio::test]
    async fn insert_candidate_ignores_self() {
        let overlay: SharedOverlay = Arc::new(InMemoryOverlay::new());
        let local = NodeId::random();
        let table = DhtTable::new(local, NodeType::Standard, overlay);
        let (addr, port) = localhost(9000);
        table
            .insert_candidate(&local.to_hex(), addr, port, NodeType::Standard)
            .await
            .unwrap();
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn eviction_drops_oldest_entry_past_capacity() {
        let overlay: SharedOverlay = Arc::new(InMemoryOverlay::new());
        let local = NodeId::random();
        let table = DhtTable::new(local, NodeType::Standard, overlay);

        for i in 0..(ROUTING_TABLE_CAP + 3) {
            let hex = format!("{i:040x}");
            let (addr, port) = localhost(1000);
            table
                .insert_candidate(&hex, addr, port, NodeType::Standard)
                .await
                .unwrap();
        }

        assert!(table.len().await <= ROUTING_TABLE_CAP);
    }

    #[tokio::test]
    async fn find_peers_returns_announced_entry() {
        let overlay: SharedOverlay = Arc::new(InMemoryOverlay::new());
        let announcer = NodeId::random();
        let hash = InfoHash::from_hex(&"ab".repeat(32)).unwrap();

        let entry = ContentEntry {
            address: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            port: 4000,
            timestamp: SystemTime::now(),
        };
        let path = format!("content/{}/{}", hash.to_hex(), announcer.to_hex());
        overlay
            .put(&path, serde_json::to_vec(&entry).unwrap())
            .await
            .unwrap();

        let local = NodeId::random();
        let table = DhtTable::new(local, NodeType::Standard, overlay);
        let peers = table.find_peers(hash, 10).await.unwrap();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].port, 4000);
    }

    #[tokio::test]
    async fn absorb_routing_updates_picks_up_published_entry() {
        let overlay: SharedOverlay = Arc::new(InMemoryOverlay::new());
        let remote = NodeId::random();
        let remote_table = DhtTable::new(remote, NodeType::Standard, Arc::clone(&overlay));
        remote_table.publish_self(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)), 6000).await.unwrap();

        let local = NodeId::random();
        let local_table = DhtTable::new(local, NodeType::Standard, overlay);
        let absorbed = local_table
            .absorb_routing_updates(Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(absorbed, 1);
        assert_eq!(local_table.len().await, 1);
    }

    #[tokio::test]
    async fn find_peers_filters_self() {
        let overlay: SharedOverlay = Arc::new(InMemoryOverlay::new());
        let local = NodeId::random();
        let hash = InfoHash::from_hex(&"cd".repeat(32)).unwrap();

        let entry = ContentEntry {
            address: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            port: 5000,
            timestamp: SystemTime::now(),
        };
        let path = format!("content/{}/{}", hash.to_hex(), local.to_hex());
        overlay
            .put(&path, serde_json::to_vec(&entry).unwrap())
            .await
            .unwrap();

        let table = DhtTable::new(local, NodeType::Standard, overlay);
        let peers = table.find_peers(hash, 10).await.unwrap();
        assert!(peers.is_empty());
    }
}
