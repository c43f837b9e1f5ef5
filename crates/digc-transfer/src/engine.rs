//! Multi-peer transfer engine.
//!
//! BitTorrent-style parallel chunk downloader: rarest-first piece
//! selection, endgame duplication once a download is mostly complete,
//! adaptive concurrency driven by measured throughput, slow-peer
//! eviction, continuous peer discovery, and strict-index-order
//! reassembly with incremental end-to-end verification.
//!
//! Generalizes the node module's `MultiPeerCoordinator`: the same
//! `RwLock`-guarded peer-stats map and EMA scoring, but one fixed
//! algorithm rather than a pluggable strategy enum.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rand::Rng;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use digc_core::model::{ChunkState, ChunkStatus, ContentId, FileDescriptor, PeerRecord};
use digc_core::{ContentHash, InfoHash, NodeId};
use digc_discovery::DiscoveryManager;

use crate::chunker::FileReassembler;
use crate::error::TransferError;
use crate::session::{PeerConnector, PeerSession};

/// Fraction of total chunks complete at which endgame duplication begins.
const ENDGAME_THRESHOLD: f64 = 0.95;
/// Chunks requested in parallel for a single piece once in endgame mode.
const ENDGAME_FANOUT: usize = 3;
/// How often concurrency and slow-peer eviction are reassessed.
const DEFAULT_BANDWIDTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);
/// How often the engine looks for additional peers mid-download.
const CONTINUOUS_DISCOVERY_INTERVAL: Duration = Duration::from_secs(30);
/// Peers connected up front, before the rest trickle in opportunistically.
const PRIORITY_PEER_COUNT: usize = 3;
/// File-size band below which `min_concurrency` applies outright.
const SMALL_FILE_BYTES: u64 = 1024 * 1024;
/// File-size band above which `max_concurrency` applies outright.
const LARGE_FILE_BYTES: u64 = 100 * 1024 * 1024;

/// Either an already-resolved hash or an application-level name to resolve
/// via a content-id mapping (falling back to treating it as the hash).
#[derive(Clone, Debug)]
pub enum ContentRef {
    /// A resolved content hash.
    Hash(ContentHash),
    /// An opaque content id, resolved via `resolve_content_id`.
    Id(ContentId),
}

/// Tunable behavior for a single download. Mirrors the external
/// configuration surface: chunk size is negotiated from the peer's
/// descriptor, everything else here governs local scheduling.
#[derive(Clone, Debug)]
pub struct DownloadOptions {
    /// Floor on the number of in-flight chunk requests.
    pub min_concurrency: usize,
    /// Ceiling on the number of in-flight chunk requests.
    pub max_concurrency: usize,
    /// Per-attempt connection budget.
    pub peer_timeout: Duration,
    /// How often throughput is sampled and concurrency re-adjusted.
    pub bandwidth_check_interval: Duration,
    /// Fraction of the active-peer average speed below which a peer is
    /// evicted from scheduling.
    pub slow_peer_threshold: f64,
    /// Target number of simultaneously connected peers.
    pub max_peers_to_connect: usize,
    /// Whether to periodically query discovery for additional peers.
    pub enable_continuous_discovery: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            min_concurrency: 4,
            max_concurrency: 32,
            peer_timeout: Duration::from_secs(30),
            bandwidth_check_interval: DEFAULT_BANDWIDTH_CHECK_INTERVAL,
            slow_peer_threshold: 0.5,
            max_peers_to_connect: 10,
            enable_continuous_discovery: true,
        }
    }
}

/// Outcome of a completed download.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    /// Where the assembled file was written.
    pub path: PathBuf,
    /// Final per-peer statistics, keyed by peer.
    pub peer_stats: HashMap<NodeId, digc_core::model::PeerDownloadStats>,
    /// Average aggregate speed across the whole download, bytes/sec.
    pub average_speed_bps: f64,
    /// Wall-clock time from connection phase to verified completion.
    pub total_time: Duration,
    /// Connection method used to reach each peer that contributed.
    pub connection_methods: HashMap<NodeId, digc_core::model::ConnectionMethod>,
}

struct RunningHash {
    hasher: Sha256,
    next_index: u64,
    pending: BTreeMap<u64, Vec<u8>>,
}

impl RunningHash {
    fn new() -> Self {
        Self {
            hasher: Sha256::new(),
            next_index: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Feed a completed chunk in; consumes every contiguous run starting
    /// at `next_index` so the hash stays strictly in index order even
    /// though chunks arrive out of order.
    fn feed(&mut self, index: u64, data: Vec<u8>) {
        self.pending.insert(index, data);
        while let Some(data) = self.pending.remove(&self.next_index) {
            self.hasher.update(&data);
            self.next_index += 1;
        }
    }

    fn finish(self) -> ContentHash {
        ContentHash::from_bytes(self.hasher.finalize().into())
    }
}

struct EngineState {
    chunks: Vec<ChunkState>,
    sessions: HashMap<NodeId, Arc<dyn PeerSession>>,
    stats: HashMap<NodeId, digc_core::model::PeerDownloadStats>,
    concurrency: usize,
}

impl EngineState {
    fn active_peers(&self) -> Vec<NodeId> {
        self.stats
            .iter()
            .filter(|(_, s)| s.active)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Rarest-first pending-chunk selection, falling back to lowest index
    /// when no rarity data has been collected yet.
    fn select_chunk(&self) -> Option<u64> {
        let have_rarity = self.chunks.iter().any(|c| c.rarity > 0);
        self.chunks
            .iter()
            .filter(|c| matches!(c.status, ChunkStatus::Pending))
            .min_by_key(|c| if have_rarity { c.rarity } else { 0 })
            .map(|c| c.index)
    }

    /// 0.7 fastest-active, 0.3 uniform-from-top-half (per the spec's peer
    /// diversity rule), excluding peers already chosen for the current
    /// endgame fanout so duplicate requests land on distinct peers.
    fn select_peer_excluding(&self, exclude: &std::collections::HashSet<NodeId>) -> Option<NodeId> {
        let mut active: Vec<_> = self
            .stats
            .iter()
            .filter(|(id, s)| s.active && !exclude.contains(*id))
            .collect();
        if active.is_empty() {
            return None;
        }
        active.sort_by(|a, b| b.1.ema_speed_bps.partial_cmp(&a.1.ema_speed_bps).unwrap());

        let mut rng = rand::thread_rng();
        if rng.gen_bool(0.7) {
            Some(*active[0].0)
        } else {
            let half = (active.len() / 2).max(1);
            active[..half].choose(&mut rng).map(|(id, _)| **id)
        }
    }

    fn completion_fraction(&self) -> f64 {
        let total = self.chunks.len();
        if total == 0 {
            return 1.0;
        }
        let complete = self
            .chunks
            .iter()
            .filter(|c| matches!(c.status, ChunkStatus::Complete))
            .count();
        complete as f64 / total as f64
    }

    fn is_complete(&self) -> bool {
        self.chunks.iter().all(|c| matches!(c.status, ChunkStatus::Complete))
    }
}

/// Resolve a [`ContentRef`] to a [`ContentHash`], falling back to parsing
/// the content id as hex when no mapping is supplied or matches.
fn resolve_content(
    content: &ContentRef,
    resolve_content_id: Option<&(dyn Fn(&ContentId) -> Option<ContentHash> + Send + Sync)>,
) -> Result<ContentHash, TransferError> {
    match content {
        ContentRef::Hash(h) => Ok(*h),
        ContentRef::Id(id) => {
            if let Some(resolver) = resolve_content_id {
                if let Some(hash) = resolver(id) {
                    return Ok(hash);
                }
            }
            ContentHash::from_hex(id.as_str()).map_err(TransferError::Core)
        }
    }
}

/// Connect to a priority subset of peers up front, then the remainder
/// opportunistically without blocking the caller.
async fn connect_priority_peers(
    peers: &[PeerRecord],
    connector: &Arc<dyn PeerConnector>,
) -> HashMap<NodeId, Arc<dyn PeerSession>> {
    let mut joined = JoinSet::new();
    let priority = peers.iter().take(PRIORITY_PEER_COUNT).cloned();
    for peer in priority {
        let connector = Arc::clone(connector);
        joined.spawn(async move { connector.connect(&peer).await });
    }

    let mut sessions = HashMap::new();
    while let Some(res) = joined.join_next().await {
        if let Ok(Ok(session)) = res {
            sessions.insert(session.peer(), session);
        }
    }

    for peer in peers.iter().skip(PRIORITY_PEER_COUNT).cloned() {
        let connector = Arc::clone(connector);
        tokio::spawn(async move {
            let _ = connector.connect(&peer).await;
        });
    }

    sessions
}

fn initial_concurrency(total_bytes: u64, opts: &DownloadOptions) -> usize {
    if total_bytes <= SMALL_FILE_BYTES {
        opts.min_concurrency
    } else if total_bytes >= LARGE_FILE_BYTES {
        opts.max_concurrency
    } else {
        let span = (opts.max_concurrency - opts.min_concurrency) as f64;
        let frac = (total_bytes - SMALL_FILE_BYTES) as f64
            / (LARGE_FILE_BYTES - SMALL_FILE_BYTES) as f64;
        opts.min_concurrency + (frac * span).round() as usize
    }
}

/// Download `content` from `peers`, writing the assembled file under
/// `output_dir`, named by the descriptor's metadata if present or else the
/// content hash in hex.
///
/// `discovery` and `resolve_content_id` are optional: without them the
/// download proceeds with exactly the given peer set and treats `content`
/// as an already-resolved hash (or fails to parse a non-hex id).
#[allow(clippy::too_many_arguments)]
pub async fn download_file(
    peers: Vec<PeerRecord>,
    content: ContentRef,
    connector: Arc<dyn PeerConnector>,
    discovery: Option<Arc<DiscoveryManager>>,
    resolve_content_id: Option<&(dyn Fn(&ContentId) -> Option<ContentHash> + Send + Sync)>,
    output_dir: &Path,
    options: DownloadOptions,
    cancel: CancellationToken,
) -> Result<DownloadResult, TransferError> {
    let started = Instant::now();
    let content_hash = resolve_content(&content, resolve_content_id)?;

    let sessions = connect_priority_peers(&peers, &connector).await;
    if sessions.is_empty() {
        return Err(TransferError::InsufficientPeers);
    }

    let descriptor = negotiate_metadata(&sessions, content_hash).await?;
    let chunk_count = descriptor.chunk_count();

    let mut chunks: Vec<ChunkState> = (0..chunk_count).map(ChunkState::pending).collect();
    collect_rarity(&sessions, content_hash, chunk_count, &mut chunks).await;

    let concurrency = initial_concurrency(descriptor.total_bytes, &options);

    let state = Arc::new(Mutex::new(EngineState {
        chunks,
        sessions,
        stats: HashMap::new(),
        concurrency,
    }));
    {
        let mut guard = state.lock().await;
        let peers: Vec<(NodeId, digc_core::model::ConnectionMethod)> = guard
            .sessions
            .values()
            .map(|s| (s.peer(), s.connection_method()))
            .collect();
        for (id, method) in peers {
            guard
                .stats
                .entry(id)
                .or_insert_with(|| digc_core::model::PeerDownloadStats::new(id, method));
        }
    }

    let file_name = descriptor
        .metadata
        .clone()
        .unwrap_or_else(|| content_hash.to_hex());
    let output_path = output_dir.join(file_name);
    let reassembler = Arc::new(Mutex::new(FileReassembler::new(
        &output_path,
        descriptor.total_bytes,
        usize::try_from(descriptor.chunk_size).unwrap_or(usize::MAX),
    )?));
    let running_hash = Arc::new(Mutex::new(RunningHash::new()));

    run_schedule_loop(
        Arc::clone(&state),
        content_hash,
        Arc::clone(&reassembler),
        Arc::clone(&running_hash),
        discovery,
        &peers,
        &connector,
        &options,
        cancel,
    )
    .await?;

    let digest = Arc::try_unwrap(running_hash)
        .map_err(|_| TransferError::TransientNetwork("running hash still shared".into()))?
        .into_inner()
        .finish();
    if !digest.ct_eq(&content_hash) {
        warn!(expected = %content_hash, actual = %digest, "end-to-end hash mismatch");
        return Err(TransferError::IntegrityFailed {
            expected: content_hash.to_hex(),
            actual: digest.to_hex(),
        });
    }

    Arc::try_unwrap(reassembler)
        .map_err(|_| TransferError::TransientNetwork("reassembler still shared".into()))?
        .into_inner()
        .finalize()?;

    let guard = state.lock().await;
    let total_bytes: u64 = guard.stats.values().map(|s| s.bytes_downloaded).sum();
    let total_time = started.elapsed();
    let average_speed_bps = if total_time.as_secs_f64() > 0.0 {
        total_bytes as f64 / total_time.as_secs_f64()
    } else {
        total_bytes as f64
    };
    let connection_methods = guard
        .sessions
        .values()
        .map(|s| (s.peer(), s.connection_method()))
        .collect();

    Ok(DownloadResult {
        path: output_path,
        peer_stats: guard.stats.clone(),
        average_speed_bps,
        total_time,
        connection_methods,
    })
}

async fn negotiate_metadata(
    sessions: &HashMap<NodeId, Arc<dyn PeerSession>>,
    content_hash: ContentHash,
) -> Result<FileDescriptor, TransferError> {
    for session in sessions.values() {
        if let Ok(Some(descriptor)) = session.request_metadata(content_hash).await {
            return Ok(descriptor);
        }
    }
    Err(TransferError::InsufficientPeers)
}

async fn collect_rarity(
    sessions: &HashMap<NodeId, Arc<dyn PeerSession>>,
    content_hash: ContentHash,
    chunk_count: u64,
    chunks: &mut [ChunkState],
) {
    for session in sessions.values() {
        if let Ok(bitmap) = session.request_bitmap(content_hash, chunk_count).await {
            for (i, has) in bitmap.into_iter().enumerate() {
                if has {
                    if let Some(chunk) = chunks.get_mut(i) {
                        chunk.rarity += 1;
                    }
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_schedule_loop(
    state: Arc<Mutex<EngineState>>,
    content_hash: ContentHash,
    reassembler: Arc<Mutex<FileReassembler>>,
    running_hash: Arc<Mutex<RunningHash>>,
    discovery: Option<Arc<DiscoveryManager>>,
    initial_peers: &[PeerRecord],
    connector: &Arc<dyn PeerConnector>,
    options: &DownloadOptions,
    cancel: CancellationToken,
) -> Result<(), TransferError> {
    let peer_count_at_start = {
        let guard = state.lock().await;
        guard.sessions.len().max(1)
    };

    let mut in_flight: JoinSet<(u64, NodeId, Result<Vec<u8>, TransferError>, Instant)> =
        JoinSet::new();
    let mut endgame_inflight: std::collections::HashSet<u64> = std::collections::HashSet::new();
    let mut endgame_handles: HashMap<u64, Vec<tokio::task::AbortHandle>> = HashMap::new();
    let mut bandwidth_tick = tokio::time::interval(options.bandwidth_check_interval);
    let mut discovery_tick = tokio::time::interval(CONTINUOUS_DISCOVERY_INTERVAL);
    let mut last_sample_bytes: u64 = 0;
    let mut last_interval_delta: u64 = 0;
    let mut known_peer_addrs: std::collections::HashSet<(std::net::IpAddr, u16)> = initial_peers
        .iter()
        .map(|p| (p.address, p.port))
        .collect();

    loop {
        fill_in_flight(
            &state,
            content_hash,
            &mut in_flight,
            &mut endgame_inflight,
            &mut endgame_handles,
        )
        .await;

        let done = {
            let guard = state.lock().await;
            guard.is_complete()
        };
        if done && in_flight.is_empty() {
            return Ok(());
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(TransferError::Cancelled);
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                let (index, peer, result, started_at) = joined
                    .map_err(|e| TransferError::TransientNetwork(e.to_string()))?;
                handle_chunk_result(
                    &state,
                    &reassembler,
                    &running_hash,
                    &mut endgame_inflight,
                    &mut endgame_handles,
                    peer_count_at_start,
                    index,
                    peer,
                    result,
                    started_at,
                )
                .await?;
            }
            _ = bandwidth_tick.tick() => {
                adjust_concurrency_and_evict(
                    &state,
                    &mut last_sample_bytes,
                    &mut last_interval_delta,
                    options,
                )
                .await;
            }
            _ = discovery_tick.tick(), if options.enable_continuous_discovery && discovery.is_some() => {
                if let Some(disc) = &discovery {
                    discover_more_peers(
                        &state,
                        disc,
                        content_hash,
                        connector,
                        &mut known_peer_addrs,
                        options,
                    )
                    .await;
                }
            }
        }
    }
}

async fn fill_in_flight(
    state: &Arc<Mutex<EngineState>>,
    content_hash: ContentHash,
    in_flight: &mut JoinSet<(u64, NodeId, Result<Vec<u8>, TransferError>, Instant)>,
    endgame_inflight: &mut std::collections::HashSet<u64>,
    endgame_handles: &mut HashMap<u64, Vec<tokio::task::AbortHandle>>,
) {
    loop {
        let mut guard = state.lock().await;
        if in_flight.len() >= guard.concurrency {
            return;
        }
        let endgame = guard.completion_fraction() >= ENDGAME_THRESHOLD;
        let Some(index) = guard.select_chunk() else {
            return;
        };
        let fanout = if endgame { ENDGAME_FANOUT } else { 1 };
        if endgame {
            endgame_inflight.insert(index);
        }

        let mut chosen: std::collections::HashSet<NodeId> = std::collections::HashSet::new();
        let mut spawned_any = false;
        for _ in 0..fanout {
            let Some(peer) = guard.select_peer_excluding(&chosen) else {
                break;
            };
            let Some(session) = guard.sessions.get(&peer).cloned() else {
                continue;
            };
            chosen.insert(peer);
            if let Some(chunk) = guard.chunks.get_mut(index as usize) {
                chunk.mark_in_flight(peer);
            }
            let handle = in_flight.spawn(async move {
                let started_at = Instant::now();
                let result = session.request_chunk(content_hash, index).await;
                (index, peer, result, started_at)
            });
            if endgame {
                endgame_handles.entry(index).or_default().push(handle);
            }
            spawned_any = true;
        }
        drop(guard);
        if !spawned_any {
            return;
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_chunk_result(
    state: &Arc<Mutex<EngineState>>,
    reassembler: &Arc<Mutex<FileReassembler>>,
    running_hash: &Arc<Mutex<RunningHash>>,
    endgame_inflight: &mut std::collections::HashSet<u64>,
    endgame_handles: &mut HashMap<u64, Vec<tokio::task::AbortHandle>>,
    peer_count_at_start: usize,
    index: u64,
    peer: NodeId,
    result: Result<Vec<u8>, TransferError>,
    started_at: Instant,
) -> Result<(), TransferError> {
    let mut guard = state.lock().await;

    match result {
        Ok(data) => {
            let already_complete = guard
                .chunks
                .get(index as usize)
                .map(|c| matches!(c.status, ChunkStatus::Complete))
                .unwrap_or(true);
            if already_complete {
                // endgame duplicate losing its race; abort any siblings still
                // running and discard this one.
                abort_endgame_siblings(endgame_handles, index);
                return Ok(());
            }

            if let Some(chunk) = guard.chunks.get_mut(index as usize) {
                chunk.mark_complete();
            }
            endgame_inflight.remove(&index);
            abort_endgame_siblings(endgame_handles, index);
            if let Some(stats) = guard.stats.get_mut(&peer) {
                stats.record_success(data.len() as u64, started_at.elapsed());
            }
            drop(guard);

            reassembler.lock().await.write_chunk(index, &data)?;
            running_hash.lock().await.feed(index, data);
            Ok(())
        }
        Err(err) => {
            debug!(%peer, index, %err, "chunk attempt failed");
            if let Some(stats) = guard.stats.get_mut(&peer) {
                stats.record_failure();
            }
            let peer_count = guard.sessions.len().max(peer_count_at_start);
            if let Some(chunk) = guard.chunks.get_mut(index as usize) {
                if !matches!(chunk.status, ChunkStatus::Complete) {
                    chunk.revert_to_pending();
                    if chunk.attempts >= 2 * peer_count as u32 {
                        let attempts = chunk.attempts;
                        return Err(TransferError::ChunkAbandoned { index, attempts });
                    }
                }
            }
            Ok(())
        }
    }
}

/// Abort every endgame duplicate still running for `index` other than the
/// one whose result just arrived — the winner (or a losing duplicate that
/// raced in afterward) makes the rest of the fan-out moot.
fn abort_endgame_siblings(
    endgame_handles: &mut HashMap<u64, Vec<tokio::task::AbortHandle>>,
    index: u64,
) {
    if let Some(handles) = endgame_handles.remove(&index) {
        for handle in handles {
            handle.abort();
        }
    }
}

async fn adjust_concurrency_and_evict(
    state: &Arc<Mutex<EngineState>>,
    last_sample_bytes: &mut u64,
    last_interval_delta: &mut u64,
    options: &DownloadOptions,
) {
    let mut guard = state.lock().await;
    let total_bytes: u64 = guard.stats.values().map(|s| s.bytes_downloaded).sum();
    let delta = total_bytes.saturating_sub(*last_sample_bytes);
    *last_sample_bytes = total_bytes;

    if *last_interval_delta > 0 {
        let change = delta as f64 / *last_interval_delta as f64 - 1.0;
        if change >= 0.10 {
            guard.concurrency = (guard.concurrency + 1).min(options.max_concurrency);
        } else if change <= -0.10 {
            guard.concurrency = guard.concurrency.saturating_sub(1).max(options.min_concurrency);
        }
    }
    *last_interval_delta = delta;

    let active: Vec<_> = guard
        .stats
        .iter()
        .filter(|(_, s)| s.active)
        .map(|(id, s)| (*id, s.ema_speed_bps))
        .collect();
    if active.is_empty() {
        return;
    }
    let average = active.iter().map(|(_, s)| *s).sum::<f64>() / active.len() as f64;
    let threshold = average * options.slow_peer_threshold;

    let mut to_evict = Vec::new();
    for (id, speed) in &active {
        if *speed < threshold {
            to_evict.push(*id);
        }
    }
    for id in to_evict {
        if let Some(stats) = guard.stats.get_mut(&id) {
            stats.active = false;
        }
    }

    let still_active = guard.active_peers().len();
    let min_active = guard.stats.len().min(3);
    if still_active < min_active {
        let mut inactive: Vec<_> = guard
            .stats
            .iter()
            .filter(|(_, s)| !s.active)
            .map(|(id, s)| (*id, s.ema_speed_bps))
            .collect();
        inactive.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        for (id, _) in inactive.into_iter().take(min_active - still_active) {
            if let Some(stats) = guard.stats.get_mut(&id) {
                stats.reactivate();
            }
        }
    }
}

async fn discover_more_peers(
    state: &Arc<Mutex<EngineState>>,
    discovery: &Arc<DiscoveryManager>,
    content_hash: ContentHash,
    connector: &Arc<dyn PeerConnector>,
    known_peer_addrs: &mut std::collections::HashSet<(std::net::IpAddr, u16)>,
    options: &DownloadOptions,
) {
    let active_count = {
        let guard = state.lock().await;
        guard.active_peers().len()
    };
    if active_count >= options.max_peers_to_connect {
        return;
    }

    let Ok(candidates) = discovery
        .find_peers(
            InfoHash::from_content_hash(content_hash),
            options.max_peers_to_connect,
            options.peer_timeout,
        )
        .await
    else {
        return;
    };

    for candidate in candidates {
        let key = (candidate.address, candidate.port);
        if !known_peer_addrs.insert(key) {
            continue;
        }
        if let Ok(session) = connector.connect(&candidate).await {
            let peer = session.peer();
            let method = session.connection_method();
            let mut guard = state.lock().await;
            guard.sessions.insert(peer, session);
            guard
                .stats
                .entry(peer)
                .or_insert_with(|| digc_core::model::PeerDownloadStats::new(peer, method));
            info!(%peer, "continuous discovery connected new peer");
        }
    }
}
