//! The NAT traversal manager: tries connection methods in a learned order
//! until one succeeds, recording the winner so future attempts to the same
//! peer try it first.
//!
//! Grounded in the teacher's `DiscoveryManager::connect_to_peer`, which
//! chained direct → hole-punch → relay attempts for one peer; this
//! generalizes that chain to the full method list and backs the "last
//! known good" shortcut with [`digc_core::registry::ConnectionRegistry`]
//! instead of an ad hoc single-field cache.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::debug;

use digc_core::config::NatConfig;
use digc_core::ids::NodeId;
use digc_core::model::ConnectionMethod;
use digc_core::registry::ConnectionRegistry;

use super::hole_punch::HolePuncher;
use super::ice::IceGatherer;
use super::turn::{TurnClient, TurnCredentials};
use super::types::NatType;
use super::upnp::UpnpClient;
use crate::error::NatTraversalError;

/// Inputs a caller supplies for one connection attempt.
#[derive(Clone, Debug, Default)]
pub struct ConnectionOptions {
    /// A known address to try directly, if any (e.g. from a prior session
    /// or a manual peer entry).
    pub known_address: Option<SocketAddr>,
    /// The peer's address on the local network, if discovered (enables the
    /// LAN-internal hole-punch path).
    pub internal_address: Option<SocketAddr>,
    /// The peer's externally observed (server-reflexive) address, used for
    /// UDP hole punching and as the ICE/TURN target.
    pub external_address: Option<SocketAddr>,
    /// The local port to request a UPnP mapping for, if UPnP is attempted.
    pub local_port: Option<u16>,
    /// This node's NAT classification, if already probed via
    /// [`super::types::NatDetector`]. When present, it reorders the
    /// attempted strategy list before any learned per-peer preference is
    /// applied; when absent, [`default_strategy_order`] is used unchanged.
    pub nat_type: Option<NatType>,
}

/// A successful connection: the method that worked and the address reached.
#[derive(Clone, Copy, Debug)]
pub struct ConnectionOutcome {
    /// The method used to establish connectivity.
    pub method: ConnectionMethod,
    /// The address the peer was reached at.
    pub address: SocketAddr,
}

/// Coordinates NAT traversal for one node, sharing a [`ConnectionRegistry`]
/// across every peer it connects to.
pub struct NatTraversalManager {
    config: NatConfig,
    registry: Arc<ConnectionRegistry>,
}

impl NatTraversalManager {
    /// Build a manager over a shared registry, so its learned preferences
    /// persist across downloads within the same process.
    #[must_use]
    pub fn new(config: NatConfig, registry: Arc<ConnectionRegistry>) -> Self {
        Self { config, registry }
    }

    /// Establish connectivity to `remote`, trying the registry's preferred
    /// method first, then the default strategy order, recording whichever
    /// method succeeds.
    ///
    /// # Errors
    /// Returns [`NatTraversalError::AllMethodsExhausted`] with every
    /// attempted method's failure reason if none succeeded.
    pub async fn connect(
        &self,
        _local: NodeId,
        remote: NodeId,
        options: &ConnectionOptions,
    ) -> Result<ConnectionOutcome, NatTraversalError> {
        let mut order = strategy_order_for(options.nat_type);
        if let Some(preferred) = self.registry.preferred_method(&remote) {
            order.retain(|m| *m != preferred);
            order.insert(0, preferred);
        }

        let mut failures = Vec::new();
        for method in order {
            match self.try_method(method, options).await {
                Ok(address) => {
                    self.registry.record_success(remote, method);
                    return Ok(ConnectionOutcome { method, address });
                }
                Err(reason) => {
                    debug!(?method, %reason, "traversal method failed");
                    failures.push(format!("{method:?}: {reason}"));
                }
            }
        }

        self.registry.record_failure(&remote);
        Err(NatTraversalError::AllMethodsExhausted(failures))
    }

    async fn try_method(
        &self,
        method: ConnectionMethod,
        options: &ConnectionOptions,
    ) -> Result<SocketAddr, NatTraversalError> {
        match method {
            ConnectionMethod::OverlayRelay => Err(NatTraversalError::MethodFailed {
                method: "OverlayRelay".to_string(),
                reason: "no overlay relay address available".to_string(),
            }),
            ConnectionMethod::IceHost => self.try_direct(options).await,
            ConnectionMethod::Upnp => self.try_upnp(options).await,
            ConnectionMethod::UdpPunch => self.try_udp_punch(options).await,
            ConnectionMethod::TcpSimOpen | ConnectionMethod::TcpPunch => {
                self.try_tcp(method, options).await
            }
            ConnectionMethod::IceSrflx => self.try_ice(options).await,
            ConnectionMethod::IceRelay => self.try_turn(options).await,
        }
    }

    async fn try_direct(&self, options: &ConnectionOptions) -> Result<SocketAddr, NatTraversalError> {
        let address = options
            .known_address
            .ok_or_else(|| NatTraversalError::MethodFailed {
                method: "direct".to_string(),
                reason: "no known address".to_string(),
            })?;

        match tokio::time::timeout(self.config.direct_timeout, TcpStream::connect(address)).await {
            Ok(Ok(_stream)) => Ok(address),
            Ok(Err(e)) => Err(NatTraversalError::MethodFailed {
                method: "direct".to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(NatTraversalError::Timeout {
                method: "direct".to_string(),
            }),
        }
    }

    async fn try_upnp(&self, options: &ConnectionOptions) -> Result<SocketAddr, NatTraversalError> {
        let local_port = options
            .local_port
            .ok_or_else(|| NatTraversalError::MethodFailed {
                method: "upnp".to_string(),
                reason: "no local port to map".to_string(),
            })?;

        let client = UpnpClient::discover(self.config.direct_timeout).await?;

        let external = client.external_address().await?;
        let mapping = client.add_port_mapping(local_port, local_port, "UDP").await?;
        Ok(SocketAddr::new(external, mapping.external_port))
    }

    async fn try_udp_punch(
        &self,
        options: &ConnectionOptions,
    ) -> Result<SocketAddr, NatTraversalError> {
        let external = options
            .external_address
            .ok_or_else(|| NatTraversalError::MethodFailed {
                method: "udp_punch".to_string(),
                reason: "no external address".to_string(),
            })?;

        let puncher = HolePuncher::new("0.0.0.0:0".parse().expect("valid bind addr"))
            .await
            .map_err(NatTraversalError::Io)?;

        tokio::time::timeout(
            self.config.punch_timeout,
            puncher.punch(external, options.internal_address),
        )
        .await
        .map_err(|_| NatTraversalError::Timeout {
            method: "udp_punch".to_string(),
        })?
        .map_err(|e| NatTraversalError::MethodFailed {
            method: "udp_punch".to_string(),
            reason: e.to_string(),
        })
    }

    async fn try_tcp(
        &self,
        method: ConnectionMethod,
        options: &ConnectionOptions,
    ) -> Result<SocketAddr, NatTraversalError> {
        let address = options
            .external_address
            .or(options.known_address)
            .ok_or_else(|| NatTraversalError::MethodFailed {
                method: format!("{method:?}"),
                reason: "no candidate address".to_string(),
            })?;

        match tokio::time::timeout(self.config.punch_timeout, TcpStream::connect(address)).await {
            Ok(Ok(_stream)) => Ok(address),
            Ok(Err(e)) => Err(NatTraversalError::MethodFailed {
                method: format!("{method:?}"),
                reason: e.to_string(),
            }),
            Err(_) => Err(NatTraversalError::Timeout {
                method: format!("{method:?}"),
            }),
        }
    }

    async fn try_ice(&self, options: &ConnectionOptions) -> Result<SocketAddr, NatTraversalError> {
        let local_addr = options
            .known_address
            .unwrap_or_else(|| "0.0.0.0:0".parse().expect("valid addr"));

        let gatherer = IceGatherer::new();
        let candidates = tokio::time::timeout(self.config.ice_timeout, gatherer.gather(local_addr))
            .await
            .map_err(|_| NatTraversalError::Timeout {
                method: "ice".to_string(),
            })?
            .map_err(NatTraversalError::Io)?;

        candidates
            .into_iter()
            .max_by_key(|c| c.priority)
            .map(|c| c.address)
            .ok_or_else(|| NatTraversalError::MethodFailed {
                method: "ice".to_string(),
                reason: "no candidates gathered".to_string(),
            })
    }

    async fn try_turn(&self, options: &ConnectionOptions) -> Result<SocketAddr, NatTraversalError> {
        let server: SocketAddr = self
            .config
            .turn_server
            .as_ref()
            .ok_or_else(|| NatTraversalError::MethodFailed {
                method: "turn".to_string(),
                reason: "no turn server configured".to_string(),
            })?
            .parse()
            .map_err(|_| NatTraversalError::MethodFailed {
                method: "turn".to_string(),
                reason: "invalid turn server address".to_string(),
            })?;

        let credentials = TurnCredentials {
            username: self.config.turn_username.clone().unwrap_or_default(),
            password: self.config.turn_password.clone().unwrap_or_default(),
        };

        let client = TurnClient::connect(server, credentials)
            .await
            .map_err(|_| NatTraversalError::RelayUnreachable)?;

        let allocation = tokio::time::timeout(self.config.turn_timeout, client.allocate())
            .await
            .map_err(|_| NatTraversalError::Timeout {
                method: "turn".to_string(),
            })??;

        if let Some(peer) = options.external_address {
            client.create_permission(peer).await?;
        }

        Ok(allocation.relayed_address)
    }
}

/// The default method order before any learned preference is applied:
/// direct known address, UPnP, UDP hole punch, TCP simultaneous-open, TCP
/// hole punch, ICE, TURN relay.
#[must_use]
pub fn default_strategy_order() -> Vec<ConnectionMethod> {
    vec![
        ConnectionMethod::IceHost,
        ConnectionMethod::Upnp,
        ConnectionMethod::UdpPunch,
        ConnectionMethod::TcpSimOpen,
        ConnectionMethod::TcpPunch,
        ConnectionMethod::IceSrflx,
        ConnectionMethod::IceRelay,
    ]
}

/// The strategy order to try, adjusted for this node's own NAT
/// classification when known.
///
/// A symmetric NAT gives each destination a distinct external mapping, so
/// hole-punch methods that rely on a stable, predictable mapping
/// (`UdpPunch`, `TcpSimOpen`, `TcpPunch`) are dropped straight to relay;
/// an open/full-cone NAT keeps the default order, since direct and punch
/// methods are cheap to try first and likely to succeed.
#[must_use]
pub fn strategy_order_for(nat_type: Option<NatType>) -> Vec<ConnectionMethod> {
    match nat_type {
        Some(NatType::Symmetric) => vec![
            ConnectionMethod::IceHost,
            ConnectionMethod::Upnp,
            ConnectionMethod::IceSrflx,
            ConnectionMethod::IceRelay,
        ],
        _ => default_strategy_order(),
    }
}

impl From<NatTraversalError> for crate::error::DiscoveryError {
    fn from(e: NatTraversalError) -> Self {
        crate::error::DiscoveryError::Overlay(e.to_string())
    }
}
