//! Shared records exchanged between discovery, NAT traversal, and transfer.

use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::ids::{ContentHash, InfoHash, NodeId};

/// Where a [`PeerRecord`] was learned from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeerSource {
    /// Learned via the Kademlia-style DHT.
    Dht,
    /// Learned via Peer Exchange with an already-connected peer.
    Pex,
    /// Learned via local-network multicast.
    Local,
    /// Learned via a signaling-overlay lookup.
    Overlay,
    /// Supplied directly by the application.
    Manual,
}

/// Capability flags a peer may advertise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerCapabilities {
    /// Peer prefers encrypted transport when available.
    pub prefer_encryption: bool,
    /// Peer supports uTP-style congestion-controlled UDP.
    pub can_use_utp: bool,
    /// Peer has been confirmed reachable (not just announced).
    pub is_reachable: bool,
    /// Peer supports this toolkit's NetCrypto-equivalent transport.
    pub supports_net_crypto: bool,
}

/// A known peer and everything discovery has learned about it.
///
/// Addresses are normalized on construction: IPv6 literals are bracketed for
/// display, and link-local/loopback addresses are flagged so the discovery
/// manager can rank them appropriately. Owned exclusively by the discovery
/// manager; downloaders borrow references valid for one download's life.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeerRecord {
    /// Peer's identity, if known (peers reached without prior handshake may
    /// not yet have a confirmed NodeId).
    pub node_id: Option<NodeId>,
    /// Peer's network address.
    pub address: IpAddr,
    /// Peer's port.
    pub port: u16,
    /// Where this record was learned.
    pub source: PeerSource,
    /// Confidence in this record's accuracy, in `[0, 1]`.
    pub confidence: f64,
    /// When this peer was last observed.
    pub last_seen: SystemTime,
    /// Info-hashes this peer is known to hold, if any.
    pub info_hashes: Option<Vec<InfoHash>>,
    /// Advertised capability flags.
    pub capabilities: PeerCapabilities,
}

impl PeerRecord {
    /// Construct a record, normalizing its address (flagging loopback and
    /// link-local addresses via [`Self::is_link_local_or_loopback`]).
    #[must_use]
    pub fn new(
        node_id: Option<NodeId>,
        address: IpAddr,
        port: u16,
        source: PeerSource,
        confidence: f64,
    ) -> Self {
        Self {
            node_id,
            address,
            port,
            source,
            confidence: confidence.clamp(0.0, 1.0),
            last_seen: SystemTime::now(),
            info_hashes: None,
            capabilities: PeerCapabilities::default(),
        }
    }

    /// Socket address for this peer.
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    /// Display-normalized address: IPv6 literals are bracketed.
    #[must_use]
    pub fn normalized_address(&self) -> String {
        match self.address {
            IpAddr::V4(v4) => v4.to_string(),
            IpAddr::V6(v6) => format!("[{v6}]"),
        }
    }

    /// True if this address is link-local or loopback and so unlikely to be
    /// reachable from outside the local network.
    #[must_use]
    pub fn is_link_local_or_loopback(&self) -> bool {
        match self.address {
            IpAddr::V4(v4) => v4.is_loopback() || v4.is_link_local(),
            IpAddr::V6(v6) => v6.is_loopback() || (v6.segments()[0] & 0xffc0) == 0xfe80,
        }
    }

    /// Identity key used for peer-set dedup: `(source, address, port)`.
    #[must_use]
    pub fn dedup_key(&self) -> (PeerSource, IpAddr, u16) {
        (self.source, self.address, self.port)
    }
}

/// The NAT-traversal method used to reach a peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionMethod {
    /// Reached directly via a UPnP port mapping.
    Upnp,
    /// Reached via UDP hole punching.
    UdpPunch,
    /// Reached via predictive TCP hole punching.
    TcpPunch,
    /// Reached via TCP simultaneous-open.
    TcpSimOpen,
    /// Reached via an ICE host candidate (no NAT traversal needed).
    IceHost,
    /// Reached via an ICE server-reflexive candidate.
    IceSrflx,
    /// Reached via an ICE relay candidate (TURN).
    IceRelay,
    /// Reached via the signaling overlay's own relay fallback.
    OverlayRelay,
}

/// A peer's connection, owned exclusively by the connection registry and
/// reused across downloads for as long as it remains valid.
#[derive(Debug)]
pub struct ConnectionRecord {
    /// The peer this connection reaches.
    pub peer: NodeId,
    /// The method that established this connection.
    pub method: ConnectionMethod,
    /// When the connection was established.
    pub established_at: SystemTime,
}

/// Immutable file metadata negotiated once per download.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Expected end-to-end content hash.
    pub content_hash: ContentHash,
    /// Total file size in bytes.
    pub total_bytes: u64,
    /// Bytes per chunk.
    pub chunk_size: u32,
    /// Arbitrary application metadata (filename, mime type, ...).
    pub metadata: Option<String>,
}

impl FileDescriptor {
    /// Number of chunks: `ceil(total_bytes / chunk_size)`. Zero-byte files
    /// have zero chunks.
    #[must_use]
    pub fn chunk_count(&self) -> u64 {
        if self.total_bytes == 0 {
            0
        } else {
            self.total_bytes.div_ceil(u64::from(self.chunk_size))
        }
    }

    /// Byte length of chunk `index`; the final chunk may be shorter.
    #[must_use]
    pub fn chunk_len(&self, index: u64) -> u64 {
        let start = index * u64::from(self.chunk_size);
        let end = (start + u64::from(self.chunk_size)).min(self.total_bytes);
        end.saturating_sub(start)
    }
}

/// Transfer status of one chunk within one download.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkStatus {
    /// Not yet requested from any peer.
    Pending,
    /// Currently in flight from the given peer.
    InFlight(NodeId),
    /// Successfully downloaded and verified against its per-chunk hash.
    Complete,
}

/// Per-chunk bookkeeping for the lifetime of a single download.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkState {
    /// Chunk index within the file.
    pub index: u64,
    /// Current status.
    pub status: ChunkStatus,
    /// Number of download attempts so far (successful or not).
    pub attempts: u32,
    /// Number of connected peers known to hold this chunk.
    pub rarity: u32,
}

impl ChunkState {
    /// A fresh, never-attempted chunk.
    #[must_use]
    pub fn pending(index: u64) -> Self {
        Self {
            index,
            status: ChunkStatus::Pending,
            attempts: 0,
            rarity: 0,
        }
    }

    /// Transition pending/in-flight → in-flight(peer). Completed chunks are
    /// never reassigned.
    pub fn mark_in_flight(&mut self, peer: NodeId) {
        if !matches!(self.status, ChunkStatus::Complete) {
            self.status = ChunkStatus::InFlight(peer);
            self.attempts += 1;
        }
    }

    /// Transition in-flight → complete. Idempotent once complete.
    pub fn mark_complete(&mut self) {
        self.status = ChunkStatus::Complete;
    }

    /// Revert an in-flight chunk back to pending after a failed attempt.
    pub fn revert_to_pending(&mut self) {
        if !matches!(self.status, ChunkStatus::Complete) {
            self.status = ChunkStatus::Pending;
        }
    }
}

/// Per-download, per-peer transfer statistics driving peer selection,
/// slow-peer eviction, and adaptive concurrency.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeerDownloadStats {
    /// The peer these stats describe.
    pub peer: NodeId,
    /// Total bytes downloaded from this peer so far.
    pub bytes_downloaded: u64,
    /// Total chunks downloaded from this peer so far.
    pub chunks_downloaded: u64,
    /// Whether this peer currently participates in chunk scheduling.
    pub active: bool,
    /// Consecutive failed chunk attempts; 3 marks the peer inactive.
    pub consecutive_failures: u32,
    /// Exponential moving average download speed, bytes/sec.
    pub ema_speed_bps: f64,
    /// Connection method used to reach this peer.
    pub connection_method: Option<ConnectionMethod>,
    /// Timestamp of the last successful chunk from this peer.
    pub last_chunk_at: Option<SystemTime>,
}

impl PeerDownloadStats {
    /// Fresh stats for a newly connected peer.
    #[must_use]
    pub fn new(peer: NodeId, method: ConnectionMethod) -> Self {
        Self {
            peer,
            bytes_downloaded: 0,
            chunks_downloaded: 0,
            active: true,
            consecutive_failures: 0,
            ema_speed_bps: 0.0,
            connection_method: Some(method),
            last_chunk_at: None,
        }
    }

    /// Record a successful chunk download of `bytes` taking `elapsed`.
    /// EMA speed = 0.7·old + 0.3·new, per the transfer engine's spec.
    pub fn record_success(&mut self, bytes: u64, elapsed: Duration) {
        let instantaneous = if elapsed.as_secs_f64() > 0.0 {
            bytes as f64 / elapsed.as_secs_f64()
        } else {
            bytes as f64
        };
        self.ema_speed_bps = if self.chunks_downloaded == 0 {
            instantaneous
        } else {
            0.7 * self.ema_speed_bps + 0.3 * instantaneous
        };
        self.bytes_downloaded += bytes;
        self.chunks_downloaded += 1;
        self.consecutive_failures = 0;
        self.last_chunk_at = Some(SystemTime::now());
    }

    /// Record a failed chunk attempt; deactivates the peer at 3 consecutive
    /// failures.
    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= 3 {
            self.active = false;
        }
    }

    /// Reactivate a previously evicted peer, resetting its failure count.
    pub fn reactivate(&mut self) {
        self.active = true;
        self.consecutive_failures = 0;
    }
}

/// Why a [`ContentReport`] was filed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportReason {
    /// The peer did not respond to a chunk request.
    NoResponse,
    /// The peer served corrupt or mismatched chunk data.
    CorruptData,
    /// The peer's connection dropped mid-transfer.
    ConnectionDropped,
    /// The peer announced content it did not actually serve.
    FalseAnnouncement,
}

/// One node's claim that another node no longer has some content.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContentReport {
    /// The node filing the report.
    pub reporter: NodeId,
    /// The node being reported.
    pub reported: NodeId,
    /// The content in question.
    pub content_hash: ContentHash,
    /// When the report was filed.
    pub timestamp: SystemTime,
    /// Why it was filed.
    pub reason: ReportReason,
}

/// Aggregated availability status for a `(reported, hash)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReputationStatus {
    /// No credible reports of unavailability.
    Available,
    /// Some reports, not yet conclusive.
    Suspect,
    /// Enough corroborated reports (or a failed verification) to treat as
    /// gone.
    Unavailable,
}

/// Escalation level paired with [`ReputationStatus`], used for UI/logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReputationLevel {
    /// No escalation.
    None,
    /// Low confidence.
    Low,
    /// Medium confidence; triggers active verification if enabled.
    Medium,
    /// High confidence.
    High,
}

/// Aggregated reputation record for one `(reported peer, content hash)`
/// pair, recomputed deterministically from its reporter set on every
/// update.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContentReputationRecord {
    /// Current status.
    pub status: ReputationStatus,
    /// Distinct nodes that have reported against this pair.
    pub reporters: Vec<NodeId>,
    /// Sum of per-report weights (see `reputation::report_weight`).
    pub weighted_count: f64,
    /// Escalation level paired with `status`.
    pub level: ReputationLevel,
    /// Number of active-verification attempts made so far.
    pub verification_attempts: u32,
    /// Whether a verification has positively confirmed availability.
    pub verified: bool,
}
