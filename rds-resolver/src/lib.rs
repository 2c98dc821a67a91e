//! TMC location resolver (spec §4.17): maps TMC location codes to
//! coordinates via a local-file-first, Overpass-remote-fallback strategy
//! with rate limiting, per-country strategy memoization, and negative
//! caching.

pub mod cache;
pub mod error;
pub mod local;
pub mod overpass;
pub mod ratelimit;
pub mod strategy;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

pub use error::ResolverError;
pub use strategy::StrategyId;

use cache::{LocalAvailabilityCache, LocationCache, PendingSet, StrategyCache};
use overpass::{OverpassClient, OverpassTransport, ReqwestOverpassTransport};
use ratelimit::RateLimiter;

pub const BATCH_SIZE: usize = 50;
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(1100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LocationStatus {
    Resolved,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLocation {
    pub lcd: u32,
    pub lat: f64,
    pub lon: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub road_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_lcd: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_lcd: Option<u32>,
    pub status: LocationStatus,
}

impl ResolvedLocation {
    fn not_found(lcd: u32) -> Self {
        Self {
            lcd,
            lat: 0.0,
            lon: 0.0,
            name: None,
            road_ref: None,
            prev_lcd: None,
            next_lcd: None,
            status: LocationStatus::NotFound,
        }
    }

    fn from_local(lcd: u32, entry: local::LocalLocation) -> Self {
        Self {
            lcd,
            lat: entry.lat,
            lon: entry.lon,
            name: Some(entry.name),
            road_ref: None,
            prev_lcd: entry.prev_lcd,
            next_lcd: entry.next_lcd,
            status: LocationStatus::Resolved,
        }
    }

    fn from_remote(lcd: u32, fields: strategy::ResolvedFields) -> Self {
        Self {
            lcd,
            lat: fields.lat,
            lon: fields.lon,
            name: fields.name,
            road_ref: fields.road_ref,
            prev_lcd: fields.prev_lcd,
            next_lcd: fields.next_lcd,
            status: LocationStatus::Resolved,
        }
    }
}

/// Observability counters supplementing `cache_size()` (spec §6).
#[derive(Debug, Default)]
pub struct RequestStats {
    pub cache_hits: AtomicU64,
    pub local_hits: AtomicU64,
    pub remote_requests: AtomicU64,
}

impl RequestStats {
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.cache_hits.load(Ordering::Relaxed),
            self.local_hits.load(Ordering::Relaxed),
            self.remote_requests.load(Ordering::Relaxed),
        )
    }
}

pub struct Resolver<T: OverpassTransport = ReqwestOverpassTransport> {
    local_base_dir: PathBuf,
    location_cache: LocationCache,
    strategy_cache: StrategyCache,
    local_unavailable: LocalAvailabilityCache,
    pending: PendingSet,
    rate_limiter: RateLimiter,
    overpass: OverpassClient<T>,
    stats: RequestStats,
}

impl Resolver<ReqwestOverpassTransport> {
    /// Production constructor: real filesystem + `reqwest`-backed Overpass.
    pub fn new(local_base_dir: PathBuf) -> Self {
        Self::with_transport(local_base_dir, ReqwestOverpassTransport::default())
    }
}

impl<T: OverpassTransport> Resolver<T> {
    pub fn with_transport(local_base_dir: PathBuf, transport: T) -> Self {
        Self {
            local_base_dir,
            location_cache: LocationCache::default(),
            strategy_cache: StrategyCache::default(),
            local_unavailable: LocalAvailabilityCache::default(),
            pending: PendingSet::default(),
            rate_limiter: RateLimiter::new(MIN_REQUEST_INTERVAL),
            overpass: OverpassClient::new(
                transport,
                overpass::DEFAULT_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
                overpass::DEFAULT_MAX_RETRIES,
                overpass::DEFAULT_TIMEOUT,
            ),
            stats: RequestStats::default(),
        }
    }

    /// Resolve every LCD in `lcds` for `(cid, tabcd)` (spec §4.17, §6).
    ///
    /// Returns whatever is already known — cache hits plus anything the
    /// local file or remote fallback resolves in this call. LCDs currently
    /// pending (being resolved by an overlapping call) are omitted; a
    /// later call will find them cached. On a remote transient failure,
    /// batches already processed stay cached and this call returns
    /// `Err` — the idempotence property (spec §8.8) means a retry is
    /// always safe and cheap.
    pub async fn resolve(&self, lcds: &[u32], cid: u16, tabcd: u16) -> Result<HashMap<u32, ResolvedLocation>, ResolverError> {
        let mut out = HashMap::new();
        let mut misses = Vec::new();

        for &lcd in lcds {
            if let Some(cached) = self.location_cache.get(cid, tabcd, lcd) {
                self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
                out.insert(lcd, cached);
                continue;
            }
            if self.pending.is_pending(cid, tabcd, lcd) {
                continue;
            }
            misses.push(lcd);
        }

        if misses.is_empty() {
            return Ok(out);
        }

        misses = self.resolve_via_local(misses, cid, tabcd, &mut out).await;
        if misses.is_empty() {
            return Ok(out);
        }

        for batch in misses.chunks(BATCH_SIZE) {
            let _guard = self.pending.acquire(cid, tabcd, batch);
            self.stats.remote_requests.fetch_add(1, Ordering::Relaxed);

            let parsed = self.query_batch(batch, cid, tabcd).await?;
            for &lcd in batch {
                let resolved = match parsed.get(&lcd) {
                    Some(fields) => ResolvedLocation::from_remote(lcd, fields.clone()),
                    None => ResolvedLocation::not_found(lcd),
                };
                self.location_cache.set(cid, tabcd, lcd, resolved.clone());
                out.insert(lcd, resolved);
            }
        }

        Ok(out)
    }

    /// Step 2 of §4.17: local-file lookup. Mutates `out` with any hits and
    /// returns the remaining misses for the remote fallback.
    async fn resolve_via_local(&self, misses: Vec<u32>, cid: u16, tabcd: u16, out: &mut HashMap<u32, ResolvedLocation>) -> Vec<u32> {
        if self.local_unavailable.is_unavailable(cid, tabcd) {
            return misses;
        }

        let Some(entries) = local::load_local_file(&self.local_base_dir, cid, tabcd).await else {
            self.local_unavailable.mark_unavailable(cid, tabcd);
            return misses;
        };

        for lcd in misses {
            let resolved = match entries.get(&lcd) {
                Some(entry) => {
                    self.stats.local_hits.fetch_add(1, Ordering::Relaxed);
                    ResolvedLocation::from_local(lcd, entry.clone())
                }
                None => ResolvedLocation::not_found(lcd),
            };
            self.location_cache.set(cid, tabcd, lcd, resolved.clone());
            out.insert(lcd, resolved);
        }
        debug!(cid, tabcd, hits = entries.len(), "local tmc file consulted");
        // Every requested LCD is now cached (Resolved or NotFound) from the
        // local file — step 3's remote fallback never runs (spec §4.17).
        Vec::new()
    }

    /// Step 3 of §4.17: try the cached strategy if one exists, else the
    /// closed strategy set in order, caching the first that yields a
    /// non-empty result.
    async fn query_batch(&self, batch: &[u32], cid: u16, tabcd: u16) -> Result<HashMap<u32, strategy::ResolvedFields>, ResolverError> {
        let cached = self.strategy_cache.get(cid, tabcd);
        let candidates: Vec<StrategyId> = match cached {
            Some(id) => vec![id],
            None => StrategyId::ALL.to_vec(),
        };

        let mut last_err = None;
        for candidate in candidates {
            self.rate_limiter.acquire().await;
            let query = candidate.build_query(batch, cid, tabcd);
            match self.overpass.query(&query).await {
                Ok(elements) => {
                    let parsed = candidate.parse(&elements, cid, tabcd);
                    if !parsed.is_empty() {
                        if cached.is_none() {
                            self.strategy_cache.set(cid, tabcd, candidate);
                            info!(cid, tabcd, strategy = ?candidate, "overpass strategy selected");
                        }
                        return Ok(parsed);
                    }
                    // An empty-but-successful attempt clears any earlier
                    // strategy's error — only the last attempt's outcome
                    // should decide whether this batch ends in Err (spec
                    // §4.17: "on empty result continue; on error log and
                    // continue").
                    last_err = None;
                }
                Err(e) => {
                    debug!(cid, tabcd, strategy = ?candidate, error = %e, "overpass strategy failed, trying next");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) => Err(e),
            None => Ok(HashMap::new()),
        }
    }

    /// Empties all caches and the strategy memo (spec §6).
    pub fn clear_cache(&self) {
        self.location_cache.clear();
        self.strategy_cache.clear();
        self.local_unavailable.clear();
        self.pending.clear();
    }

    pub fn cache_size(&self) -> u64 {
        self.location_cache.len()
    }

    pub fn stats(&self) -> &RequestStats {
        &self.stats
    }
}
