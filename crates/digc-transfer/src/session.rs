//! Peer-session abstraction the transfer engine drives.
//!
//! `digc-transport` speaks raw datagrams and `digc-discovery`'s NAT
//! traversal manager produces a connected transport; neither knows about
//! file metadata, bitmaps, or chunk requests. A [`PeerSession`] is the
//! thin RPC surface the engine needs on top of an established connection.
//! Its wire format (framing, request/response matching) is owned by
//! whatever wires a session up — out of scope here, same as the
//! signaling overlay is an opaque collaborator to discovery.

use async_trait::async_trait;
use digc_core::model::ConnectionMethod;
use digc_core::{ContentHash, FileDescriptor, NodeId};

use crate::error::TransferError;

/// One connected peer's RPC surface, as the transfer engine needs it.
#[async_trait]
pub trait PeerSession: Send + Sync {
    /// The peer this session talks to.
    fn peer(&self) -> NodeId;

    /// The method that established the underlying connection, for
    /// per-peer stats and the final download report.
    fn connection_method(&self) -> ConnectionMethod;

    /// Negotiate metadata for `content`. A peer that doesn't have it
    /// answers `Ok(None)` rather than erroring.
    async fn request_metadata(
        &self,
        content: ContentHash,
    ) -> Result<Option<FileDescriptor>, TransferError>;

    /// Fetch this peer's piece bitmap, one entry per chunk index.
    async fn request_bitmap(
        &self,
        content: ContentHash,
        chunk_count: u64,
    ) -> Result<Vec<bool>, TransferError>;

    /// Fetch chunk `index`'s raw bytes.
    async fn request_chunk(
        &self,
        content: ContentHash,
        index: u64,
    ) -> Result<Vec<u8>, TransferError>;
}

/// Establishes [`PeerSession`]s against discovered peer candidates.
///
/// Implementations own the NAT traversal attempt (typically delegating to
/// `digc-discovery::nat::manager::NatTraversalManager`) and the session
/// wire-up on top of the resulting transport.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    /// Attempt to connect to `peer`, producing a usable session.
    async fn connect(
        &self,
        peer: &digc_core::model::PeerRecord,
    ) -> Result<std::sync::Arc<dyn PeerSession>, TransferError>;
}
