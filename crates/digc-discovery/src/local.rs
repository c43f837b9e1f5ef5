//! Local-network discovery via UDP multicast, mDNS-like in spirit: nodes
//! periodically announce themselves to a well-known multicast group and
//! listen for others doing the same.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use digc_core::ids::{InfoHash, NodeId};
use digc_core::model::{PeerRecord, PeerSource};

use crate::error::DiscoveryError;

/// Service identifier embedded in every announcement, analogous to an mDNS
/// service type.
pub const SERVICE_NAME: &str = "dig-nat-tools";

/// Multicast group used for local announcements.
pub const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 42, 99);

/// Default announcement port.
pub const MULTICAST_PORT: u16 = 5354;

/// Default interval between re-announcements.
pub const DEFAULT_ANNOUNCE_INTERVAL: Duration = Duration::from_secs(60);

/// Default TTL before a peer is considered gone.
pub const DEFAULT_PEER_TTL: Duration = Duration::from_secs(5 * 60);

/// Consecutive transient-network failures a loop tolerates before giving
/// up and propagating the error, per the `TransientNetwork` retry policy.
const TRANSIENT_RETRY_BUDGET: u32 = 5;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Announcement {
    service: String,
    peer_id: NodeId,
    port: u16,
    info_hashes: Vec<String>,
}

/// A peer learned via local multicast.
#[derive(Clone, Debug)]
pub struct LocalPeerEvent {
    /// The discovered peer.
    pub peer: PeerRecord,
}

/// Announces this node on the local network and listens for peers doing
/// the same.
pub struct LocalDiscovery {
    local_id: NodeId,
    socket: UdpSocket,
    events: broadcast::Sender<LocalPeerEvent>,
}

impl LocalDiscovery {
    /// Bind a multicast socket for announcing and listening.
    ///
    /// # Errors
    /// Returns an error if the multicast socket cannot be bound or joined.
    pub async fn bind(local_id: NodeId) -> Result<Self, DiscoveryError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, MULTICAST_PORT))
            .await
            .map_err(DiscoveryError::TransientNetwork)?;
        socket
            .join_multicast_v4(MULTICAST_GROUP, Ipv4Addr::UNSPECIFIED)
            .map_err(DiscoveryError::TransientNetwork)?;

        let (events, _) = broadcast::channel(256);
        Ok(Self {
            local_id,
            socket,
            events,
        })
    }

    /// Subscribe to discovered-peer events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LocalPeerEvent> {
        self.events.subscribe()
    }

    /// Publish one announcement advertising `info_hashes` on `port`.
    pub async fn announce_once(
        &self,
        port: u16,
        info_hashes: &[InfoHash],
    ) -> Result<(), DiscoveryError> {
        let announcement = Announcement {
            service: SERVICE_NAME.to_string(),
            peer_id: self.local_id,
            port,
            info_hashes: info_hashes.iter().map(InfoHash::to_hex).collect(),
        };
        let payload = serde_json::to_vec(&announcement)?;
        let dest = SocketAddr::new(IpAddr::V4(MULTICAST_GROUP), MULTICAST_PORT);
        self.socket
            .send_to(&payload, dest)
            .await
            .map_err(DiscoveryError::TransientNetwork)?;
        trace!(port, "published local-network announcement");
        Ok(())
    }

    /// Run the re-announce loop on `interval` until cancelled. Intended to
    /// be spawned as a background task.
    pub async fn run_announcer(
        &self,
        port: u16,
        info_hashes: Vec<InfoHash>,
        interval: Duration,
    ) -> Result<(), DiscoveryError> {
        let mut failures = 0u32;
        loop {
            match self.announce_once(port, &info_hashes).await {
                Ok(()) => failures = 0,
                Err(DiscoveryError::TransientNetwork(e)) => {
                    failures += 1;
                    warn!(error = %e, failures, "transient network error announcing locally");
                    if failures >= TRANSIENT_RETRY_BUDGET {
                        return Err(DiscoveryError::TransientNetwork(e));
                    }
                }
                Err(e) => return Err(e),
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Receive and process one incoming announcement, emitting a
    /// [`LocalPeerEvent`] unless it came from this node.
    pub async fn recv_once(&self) -> Result<(), DiscoveryError> {
        let mut buf = [0u8; 1024];
        let (len, from) = self
            .socket
            .recv_from(&mut buf)
            .await
            .map_err(DiscoveryError::TransientNetwork)?;

        let Ok(announcement) = serde_json::from_slice::<Announcement>(&buf[..len]) else {
            return Ok(());
        };
        if announcement.service != SERVICE_NAME || announcement.peer_id == self.local_id {
            return Ok(());
        }

        let mut peer = PeerRecord::new(
            Some(announcement.peer_id),
            from.ip(),
            announcement.port,
            PeerSource::Local,
            0.8,
        );
        peer.info_hashes = Some(
            announcement
                .info_hashes
                .iter()
                .filter_map(|h| InfoHash::from_hex(h).ok())
                .collect(),
        );
        debug!(peer = %announcement.peer_id, "discovered peer via local multicast");
        let _ = self.events.send(LocalPeerEvent { peer });
        Ok(())
    }

    /// Run the receive loop until cancelled. Intended to be spawned as a
    /// background task alongside [`Self::run_announcer`].
    pub async fn run_listener(&self) -> Result<(), DiscoveryError> {
        let mut failures = 0u32;
        loop {
            match self.recv_once().await {
                Ok(()) => failures = 0,
                Err(DiscoveryError::TransientNetwork(e)) => {
                    failures += 1;
                    warn!(error = %e, failures, "transient network error in local listener");
                    if failures >= TRANSIENT_RETRY_BUDGET {
                        return Err(DiscoveryError::TransientNetwork(e));
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// True if `last_seen` is older than `ttl`, per [`DEFAULT_PEER_TTL`].
#[must_use]
pub fn is_stale(last_seen: SystemTime, ttl: Duration) -> bool {
    last_seen.elapsed().unwrap_or(Duration::MAX) > ttl
}
