//! # digc-transport
//!
//! The connection transport handle for the digcore toolkit: a `Transport`
//! trait abstracting over concrete socket backends, plus UDP and TCP
//! implementations built on Tokio. Consumed by
//! [`digc_discovery::nat`](../digc_discovery/nat/index.html) for direct and
//! hole-punched connections, and available to anything implementing
//! `digc_transfer::session::PeerConnector` that needs a concrete wire
//! handle.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod tcp;
pub mod transport;
pub mod udp;

pub use tcp::TcpTransport;
pub use transport::{Transport, TransportError, TransportResult, TransportStats};
pub use udp::UdpTransport;
