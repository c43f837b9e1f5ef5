//! Workspace configuration, aggregated per subsystem the way the teacher
//! crate nests `TransportConfig`/`DiscoveryConfig`/`TransferConfig` under
//! one top-level `NodeConfig`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Node cache/rarity budget tier. Super-nodes additionally turn on the
/// counting Bloom filter for medium/low-priority hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    /// At most 100 peers, 50 cached hashes, 15-minute TTL.
    Light,
    /// At most 1000 peers, 200 cached hashes, 30-minute TTL.
    Standard,
    /// At most 10000 peers, 1000 cached hashes, 60-minute TTL, Bloom on.
    Super,
}

impl NodeType {
    /// Maximum peers held in memory for this tier.
    #[must_use]
    pub const fn max_peers(self) -> usize {
        match self {
            NodeType::Light => 100,
            NodeType::Standard => 1_000,
            NodeType::Super => 10_000,
        }
    }

    /// Maximum cached content hashes for this tier.
    #[must_use]
    pub const fn max_cached_hashes(self) -> usize {
        match self {
            NodeType::Light => 50,
            NodeType::Standard => 200,
            NodeType::Super => 1_000,
        }
    }

    /// Peer-cache TTL for this tier.
    #[must_use]
    pub const fn cache_ttl(self) -> Duration {
        match self {
            NodeType::Light => Duration::from_secs(15 * 60),
            NodeType::Standard => Duration::from_secs(30 * 60),
            NodeType::Super => Duration::from_secs(60 * 60),
        }
    }

    /// Whether medium/low priority hashes should use the counting Bloom
    /// filter instead of an exact set.
    #[must_use]
    pub const fn bloom_enabled(self) -> bool {
        matches!(self, NodeType::Super)
    }
}

/// Transfer-engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Bytes per chunk.
    pub chunk_size: u32,
    /// Initial in-flight chunk budget (interpolated by file size if unset).
    pub concurrency: Option<u32>,
    /// Floor for adaptive concurrency.
    pub min_concurrency: u32,
    /// Ceiling for adaptive concurrency.
    pub max_concurrency: u32,
    /// Per-peer connection-attempt budget.
    pub peer_timeout: Duration,
    /// Adaptive-concurrency sample period.
    pub bandwidth_check_interval: Duration,
    /// Fraction of average speed below which a peer is evicted.
    pub slow_peer_threshold: f64,
    /// Toggle per-download continuous peer discovery.
    pub enable_continuous_discovery: bool,
    /// Maximum peers to keep connected per download.
    pub max_peers: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: 65_536,
            concurrency: None,
            min_concurrency: 2,
            max_concurrency: 32,
            peer_timeout: Duration::from_secs(30),
            bandwidth_check_interval: Duration::from_secs(5),
            slow_peer_threshold: 0.5,
            enable_continuous_discovery: true,
            max_peers: 10,
        }
    }
}

/// NAT traversal tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatConfig {
    /// Ordered STUN server list.
    pub stun_servers: Vec<String>,
    /// Optional TURN server address.
    pub turn_server: Option<String>,
    /// TURN username, if a TURN server is configured.
    pub turn_username: Option<String>,
    /// TURN password, if a TURN server is configured.
    pub turn_password: Option<String>,
    /// Per-method timeout overrides; unset methods use the built-in
    /// defaults (direct 3s, punches 10s, ICE 20s, TURN 15s).
    pub direct_timeout: Duration,
    pub punch_timeout: Duration,
    pub ice_timeout: Duration,
    pub turn_timeout: Duration,
}

impl Default for NatConfig {
    fn default() -> Self {
        Self {
            stun_servers: vec![
                "stun.l.google.com:19302".to_string(),
                "stun1.l.google.com:19302".to_string(),
            ],
            turn_server: None,
            turn_username: None,
            turn_password: None,
            direct_timeout: Duration::from_secs(3),
            punch_timeout: Duration::from_secs(10),
            ice_timeout: Duration::from_secs(20),
            turn_timeout: Duration::from_secs(15),
        }
    }
}

/// Discovery source toggles and node-type budget selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Enable the Kademlia-style DHT over the signaling overlay.
    pub enable_dht: bool,
    /// Enable Peer Exchange.
    pub enable_pex: bool,
    /// Enable local-network multicast discovery.
    pub enable_local: bool,
    /// Enable signaling-overlay hash→peer lookup.
    pub enable_overlay: bool,
    /// Enable IPv6 addresses in discovery results.
    pub enable_ipv6: bool,
    /// Prefer IPv6 over IPv4 when both are available.
    pub prefer_ipv6: bool,
    /// Cache/rarity budget tier.
    pub node_type: NodeType,
    /// Port advertised in announcements.
    pub announce_port: u16,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enable_dht: true,
            enable_pex: true,
            enable_local: true,
            enable_overlay: true,
            enable_ipv6: true,
            prefer_ipv6: false,
            node_type: NodeType::Standard,
            announce_port: 0,
        }
    }
}

/// On-disk persistence of routing/peer/reputation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Whether persistence is enabled at all.
    pub enabled: bool,
    /// Directory holding the files listed in the external-interfaces spec.
    pub directory: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: PathBuf::from("./digcore-state"),
        }
    }
}

/// Logging verbosity, mirrored from the teacher's `LogLevel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// Trace-level verbosity.
    Trace,
    /// Debug-level verbosity.
    Debug,
    /// Info-level verbosity (default).
    Info,
    /// Warn-level verbosity.
    Warn,
    /// Error-level verbosity only.
    Error,
}

impl LogLevel {
    /// The `tracing_subscriber::EnvFilter` directive for this level.
    #[must_use]
    pub const fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Aggregate configuration for the whole toolkit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigConfig {
    /// Transfer-engine tuning.
    pub transfer: TransferConfig,
    /// NAT traversal tuning.
    pub nat: NatConfig,
    /// Discovery source toggles and budgets.
    pub discovery: DiscoveryConfig,
    /// On-disk persistence toggle and directory.
    pub persistence: PersistenceConfig,
    /// Logging verbosity.
    pub log_level: LogLevel,
}

impl Default for DigConfig {
    fn default() -> Self {
        Self {
            transfer: TransferConfig::default(),
            nat: NatConfig::default(),
            discovery: DiscoveryConfig::default(),
            persistence: PersistenceConfig::default(),
            log_level: LogLevel::Info,
        }
    }
}
