//! # digc-transfer
//!
//! The multi-peer transfer engine for the digcore toolkit: a
//! BitTorrent-style parallel chunk downloader with rarest-first piece
//! selection, endgame duplication, adaptive concurrency, slow-peer
//! eviction, continuous peer discovery, and end-to-end hash verification.
//!
//! This crate provides:
//! - [`chunker`]: file chunking and out-of-order reassembly
//! - [`hasher`]: per-chunk BLAKE3 and end-to-end SHA-256 hashing
//! - [`session`]: the [`session::PeerSession`]/[`session::PeerConnector`]
//!   abstraction the engine drives, decoupled from any concrete wire
//!   protocol
//! - [`engine`]: [`engine::download_file`], the entry point
//! - [`transfer`]: caller-facing transfer state bookkeeping
//! - [`error`]: [`error::TransferError`]

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunker;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod session;
pub mod transfer;

/// Default chunk size in bytes (64 KiB), matching the external
/// configuration surface's `chunkSize` default.
pub const DEFAULT_CHUNK_SIZE: usize = 65_536;

pub use engine::{download_file, ContentRef, DownloadOptions, DownloadResult};
pub use error::TransferError;
pub use session::{PeerConnector, PeerSession};
