//! Discovery and NAT-traversal error types.

use thiserror::Error;

/// Errors surfaced by the peer discovery layer.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A `NodeId` or `InfoHash` failed its hex/length validation.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// An address failed IP-family validation.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The overlay client returned an error.
    #[error("overlay error: {0}")]
    Overlay(String),

    /// No peers were found for the requested content hash.
    #[error("no peers found")]
    NoPeers,

    /// Persistence I/O failed.
    #[error("persistence error: {0}")]
    Persistence(std::io::Error),

    /// A transient network I/O error (socket bind/send/recv). Per spec
    /// retry policy this is the retry-up-to-budget class, distinct from
    /// `Persistence`'s log-and-swallow treatment.
    #[error("network error: {0}")]
    TransientNetwork(std::io::Error),

    /// Persistence (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A `digc-core` primitive rejected its input.
    #[error(transparent)]
    Core(#[from] digc_core::CoreError),
}

/// Errors from NAT traversal attempts.
#[derive(Debug, Error)]
pub enum NatTraversalError {
    /// A single method timed out.
    #[error("{method} timed out")]
    Timeout {
        /// The method that timed out.
        method: String,
    },

    /// A single method failed with a specific reason.
    #[error("{method} failed: {reason}")]
    MethodFailed {
        /// The method that failed.
        method: String,
        /// Why it failed.
        reason: String,
    },

    /// Every method in the strategy list was exhausted.
    #[error("all connection methods exhausted: {0:?}")]
    AllMethodsExhausted(Vec<String>),

    /// No gateway device responded to SSDP discovery.
    #[error("no UPnP gateway found")]
    NoGateway,

    /// The IGD rejected the requested port mapping.
    #[error("UPnP mapping refused")]
    MappingRefused,

    /// The IGD's external address could not be read.
    #[error("UPnP external address query failed")]
    AddressQueryFailed,

    /// TURN allocation was refused by the server.
    #[error("TURN allocation refused")]
    AllocationRefused,

    /// TURN long-term credential check failed.
    #[error("TURN authentication rejected")]
    AuthRejected,

    /// The TURN relay address is unreachable.
    #[error("TURN relay unreachable")]
    RelayUnreachable,

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
