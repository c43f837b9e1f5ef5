//! The signaling overlay: an external pub/sub graph of keyed nodes.
//!
//! DHT, PEX, local discovery, content-availability announcements, and
//! NAT-traversal candidate signaling are all expressed as reads and writes
//! against this one abstraction. The core never talks to a real network
//! overlay directly — it is handed one through [`OverlayClient`]. Ordering
//! is not guaranteed across paths, same-path updates converge within
//! seconds, delivery may duplicate, and readers must tolerate stale reads.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};

use crate::error::DiscoveryError;

/// A change notification delivered by [`OverlayClient::subscribe`].
#[derive(Debug, Clone)]
pub struct OverlayEvent {
    /// Full path that changed.
    pub path: String,
    /// New value published at that path.
    pub value: Vec<u8>,
}

/// A pub/sub graph of keyed nodes, consumed as an opaque external service.
#[async_trait]
pub trait OverlayClient: Send + Sync {
    /// Read the current value at `path`, if any has been published.
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, DiscoveryError>;

    /// Publish `value` as the leaf at `path`. Same-path writes are
    /// last-writer-wins from the readers' point of view.
    async fn put(&self, path: &str, value: Vec<u8>) -> Result<(), DiscoveryError>;

    /// Subscribe to every path beginning with `prefix`, receiving at least
    /// one [`OverlayEvent`] per write (delivery may duplicate).
    async fn subscribe(
        &self,
        prefix: &str,
    ) -> Result<mpsc::Receiver<OverlayEvent>, DiscoveryError>;

    /// Read `path` once, waiting up to `timeout` for a first value to
    /// appear if none is published yet.
    async fn once(
        &self,
        path: &str,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, DiscoveryError>;
}

/// An in-process overlay backed by a concurrent map and a broadcast
/// channel, useful for tests and for single-process multi-node
/// simulations. Not suitable as a real network-backed overlay — callers
/// needing one supply their own [`OverlayClient`] implementation.
pub struct InMemoryOverlay {
    store: DashMap<String, Vec<u8>>,
    changes: broadcast::Sender<OverlayEvent>,
}

impl InMemoryOverlay {
    /// Create an empty overlay.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(1024);
        Self {
            store: DashMap::new(),
            changes,
        }
    }

    /// Snapshot every stored path beginning with `prefix`.
    #[must_use]
    pub fn scan_prefix(&self, prefix: &str) -> HashMap<String, Vec<u8>> {
        self.store
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

impl Default for InMemoryOverlay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OverlayClient for InMemoryOverlay {
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, DiscoveryError> {
        Ok(self.store.get(path).map(|v| v.clone()))
    }

    async fn put(&self, path: &str, value: Vec<u8>) -> Result<(), DiscoveryError> {
        self.store.insert(path.to_string(), value.clone());
        let _ = self.changes.send(OverlayEvent {
            path: path.to_string(),
            value,
        });
        Ok(())
    }

    async fn subscribe(
        &self,
        prefix: &str,
    ) -> Result<mpsc::Receiver<OverlayEvent>, DiscoveryError> {
        let mut rx = self.changes.subscribe();
        let (tx, out_rx) = mpsc::channel(256);
        let prefix = prefix.to_string();

        for (path, value) in self.scan_prefix(&prefix) {
            let _ = tx.try_send(OverlayEvent { path, value });
        }

        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                if event.path.starts_with(&prefix) && tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        Ok(out_rx)
    }

    async fn once(
        &self,
        path: &str,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, DiscoveryError> {
        if let Some(value) = self.get(path).await? {
            return Ok(Some(value));
        }

        let mut rx = self.changes.subscribe();
        let path = path.to_string();
        let wait = async move {
            while let Ok(event) = rx.recv().await {
                if event.path == path {
                    return Some(event.value);
                }
            }
            None
        };

        Ok(tokio::time::timeout(timeout, wait).await.ok().flatten())
    }
}

/// An overlay that stores nothing and never delivers events — useful as a
/// default when a subsystem is disabled via configuration rather than
/// wired to a real overlay.
pub struct NullOverlay;

#[async_trait]
impl OverlayClient for NullOverlay {
    async fn get(&self, _path: &str) -> Result<Option<Vec<u8>>, DiscoveryError> {
        Ok(None)
    }

    async fn put(&self, _path: &str, _value: Vec<u8>) -> Result<(), DiscoveryError> {
        Ok(())
    }

    async fn subscribe(
        &self,
        _prefix: &str,
    ) -> Result<mpsc::Receiver<OverlayEvent>, DiscoveryError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn once(
        &self,
        _path: &str,
        _timeout: Duration,
    ) -> Result<Option<Vec<u8>>, DiscoveryError> {
        Ok(None)
    }
}

/// A shared, cloneable handle to an overlay client.
pub type SharedOverlay = Arc<dyn OverlayClient>;
