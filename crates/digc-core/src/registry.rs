//! Connection registry: the NAT traversal manager's memory of which method
//! last worked for a given peer, with TTL expiry and promotion/demotion.
//!
//! Grounded in the discovery crate's `DiscoveryManager`, which already
//! tracks one established method per peer; this generalizes that into a
//! process-wide, concurrently-accessed table with the learned-ordering
//! policy spec'd for the NAT traversal manager.

use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::ids::NodeId;
use crate::model::ConnectionMethod;

/// How long a registry entry remains valid without a fresh success.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// One persisted entry of `connection-registry.json`: the spec's
/// peer-to-preferred-method map.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RegistrySnapshotEntry {
    /// The peer this entry was learned for.
    pub peer: NodeId,
    /// The method promoted to preferred for this peer.
    pub method: ConnectionMethod,
}

struct Entry {
    method: ConnectionMethod,
    recorded_at: SystemTime,
    consecutive_successes: u32,
    preferred: bool,
}

/// Process-wide table of per-peer preferred NAT-traversal methods.
///
/// Readers and writers serialize through `DashMap`'s internal sharding,
/// matching the "single shared table, single coordinator" resource model
/// specified for this registry. A TTL sweep is expected to run on a
/// dedicated periodic task via [`Self::sweep_expired`].
pub struct ConnectionRegistry {
    entries: DashMap<NodeId, Entry>,
    ttl: Duration,
}

impl ConnectionRegistry {
    /// Create a registry with the default 24-hour TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Create a registry with a custom TTL, primarily for tests.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Look up the last-known-good method for `peer`, if the entry is still
    /// within TTL. Tried first by the NAT traversal manager before falling
    /// back to the default strategy order.
    #[must_use]
    pub fn preferred_method(&self, peer: &NodeId) -> Option<ConnectionMethod> {
        let entry = self.entries.get(peer)?;
        if entry.recorded_at.elapsed().unwrap_or(Duration::MAX) > self.ttl {
            return None;
        }
        Some(entry.method)
    }

    /// Record a successful connection, resetting the entry's TTL.
    /// Promotion to "preferred" requires two consecutive successes with the
    /// same method within TTL.
    pub fn record_success(&self, peer: NodeId, method: ConnectionMethod) {
        self.entries
            .entry(peer)
            .and_modify(|entry| {
                let expired = entry.recorded_at.elapsed().unwrap_or(Duration::MAX) > self.ttl;
                if !expired && entry.method == method {
                    entry.consecutive_successes += 1;
                } else {
                    entry.consecutive_successes = 1;
                }
                entry.method = method;
                entry.recorded_at = SystemTime::now();
                entry.preferred = entry.consecutive_successes >= 2;
            })
            .or_insert_with(|| Entry {
                method,
                recorded_at: SystemTime::now(),
                consecutive_successes: 1,
                preferred: false,
            });
    }

    /// Record a failure of the currently preferred method, demoting it so
    /// the next attempt order pushes it to the end.
    pub fn record_failure(&self, peer: &NodeId) {
        if let Some(mut entry) = self.entries.get_mut(peer) {
            entry.preferred = false;
            entry.consecutive_successes = 0;
        }
    }

    /// True if `peer` has a method promoted to preferred status.
    #[must_use]
    pub fn is_preferred(&self, peer: &NodeId) -> bool {
        self.entries
            .get(peer)
            .map(|e| e.preferred)
            .unwrap_or(false)
    }

    /// Remove all entries whose TTL has elapsed. Intended to be driven by a
    /// periodic background task.
    pub fn sweep_expired(&self) {
        self.entries
            .retain(|_, entry| entry.recorded_at.elapsed().unwrap_or(Duration::MAX) <= self.ttl);
    }

    /// Number of tracked peers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the registry has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot every entry currently promoted to preferred, for
    /// persisting to `connection-registry.json`.
    #[must_use]
    pub fn snapshot_preferred(&self) -> Vec<RegistrySnapshotEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.preferred)
            .map(|entry| RegistrySnapshotEntry {
                peer: *entry.key(),
                method: entry.method,
            })
            .collect()
    }

    /// Restore previously-persisted preferred methods, seeding each entry
    /// as already having reached the two-consecutive-successes promotion
    /// threshold.
    pub fn restore_preferred(&self, entries: Vec<RegistrySnapshotEntry>) {
        for snapshot in entries {
            self.entries.insert(
                snapshot.peer,
                Entry {
                    method: snapshot.method,
                    recorded_at: SystemTime::now(),
                    consecutive_successes: 2,
                    preferred: true,
                },
            );
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
