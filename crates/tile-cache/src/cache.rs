//! Consumer-scoped tile cache.
//!
//! One entry per canonical key. An entry lives exactly as long as at least
//! one on-screen tile (a [`ConsumerId`]) depends on it: it is created Pending
//! by the first request, resolved once when the transport delivers, and
//! deleted when the last consumer releases it. There is no TTL and no size
//! bound.
//!
//! The cache does no I/O. [`TileCache::request`] tells the caller whether a
//! fetch is needed, and [`TileCache::resolve`] returns the consumers to
//! notify, so the caller owns both the fetch and the redraw.
//!
//! ## Metrics
//!
//! - `tile_cache_hits_total`: requests answered by an existing entry
//! - `tile_cache_misses_total`: requests that created a new entry

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use tile_common::{CanonicalKey, ConsumerId};
use tracing::debug;

/// Lifecycle state of an entry. Pending → Resolved only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Pending,
    Resolved,
}

/// Answer to [`TileCache::request`].
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<P> {
    /// Entry already resolved; the consumer is registered and can draw now.
    Ready(P),
    /// Entry is being fetched; the consumer will be returned by `resolve`.
    Pending,
    /// New Pending entry created; the caller must issue the fetch.
    Fetch,
}

struct CacheEntry<P> {
    state: EntryState,
    payload: Option<P>,
    consumers: BTreeSet<ConsumerId>,
}

/// Cache statistics.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Requests answered by an existing entry (Ready or Pending)
    pub hits: AtomicU64,
    /// Requests that created a new entry
    pub misses: AtomicU64,
    /// Entries that reached Resolved
    pub resolved: AtomicU64,
    /// Resolutions dropped because the entry had been evicted
    pub discarded: AtomicU64,
    /// Entries deleted after their last consumer left
    pub evictions: AtomicU64,
    /// Fetches that failed, leaving the entry Pending
    pub failures: AtomicU64,
}

impl CacheStats {
    /// Hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

/// Entry map of one layer.
pub struct TileCache<P> {
    entries: HashMap<CanonicalKey, CacheEntry<P>>,
    stats: CacheStats,
}

impl<P> Default for TileCache<P> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }
}

impl<P: Clone> TileCache<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `consumer` as depending on `key`.
    ///
    /// Never creates a second entry for a key that already has one, so at
    /// most one fetch per key is ever outstanding.
    pub fn request(&mut self, consumer: ConsumerId, key: CanonicalKey) -> Lookup<P> {
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.consumers.insert(consumer);
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            counter!("tile_cache_hits_total").increment(1);

            return match (&entry.state, &entry.payload) {
                (EntryState::Resolved, Some(payload)) => Lookup::Ready(payload.clone()),
                _ => Lookup::Pending,
            };
        }

        debug!(key = %key, consumer = %consumer, "Creating pending cache entry");
        self.entries.insert(
            key,
            CacheEntry {
                state: EntryState::Pending,
                payload: None,
                consumers: BTreeSet::from([consumer]),
            },
        );
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        counter!("tile_cache_misses_total").increment(1);
        Lookup::Fetch
    }

    /// Store the fetched payload and return the consumers registered now.
    ///
    /// Returns `None` when the entry was evicted while its fetch was in
    /// flight, or was already resolved; the payload is dropped.
    pub fn resolve(&mut self, key: &CanonicalKey, payload: P) -> Option<Vec<ConsumerId>> {
        let Some(entry) = self.entries.get_mut(key) else {
            debug!(key = %key, "Discarding payload for evicted entry");
            self.stats.discarded.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        if entry.state == EntryState::Resolved {
            debug!(key = %key, "Ignoring second resolution");
            return None;
        }

        entry.state = EntryState::Resolved;
        entry.payload = Some(payload);
        self.stats.resolved.fetch_add(1, Ordering::Relaxed);
        Some(entry.consumers.iter().cloned().collect())
    }

    /// Record a fetch the service refused. The entry stays Pending, so its
    /// consumers keep their placeholder and no new fetch is issued for the
    /// key until every consumer has released it.
    pub fn fail(&mut self, key: &CanonicalKey) -> bool {
        let known = self.entries.contains_key(key);
        if known {
            self.stats.failures.fetch_add(1, Ordering::Relaxed);
        }
        known
    }

    /// Drop `consumer`'s interest in `key`. Returns true when that deleted
    /// the entry.
    pub fn release(&mut self, consumer: &ConsumerId, key: &CanonicalKey) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };

        entry.consumers.remove(consumer);
        if !entry.consumers.is_empty() {
            return false;
        }

        self.entries.remove(key);
        self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "Evicted cache entry with no consumers");
        true
    }

    pub fn state(&self, key: &CanonicalKey) -> Option<EntryState> {
        self.entries.get(key).map(|e| e.state)
    }

    pub fn payload(&self, key: &CanonicalKey) -> Option<&P> {
        self.entries.get(key).and_then(|e| e.payload.as_ref())
    }

    /// Consumers of `key`, in stable order.
    pub fn consumers(&self, key: &CanonicalKey) -> Vec<ConsumerId> {
        self.entries
            .get(key)
            .map(|e| e.consumers.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, key: &CanonicalKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Every entry with its state.
    pub fn entries(&self) -> impl Iterator<Item = (&CanonicalKey, EntryState)> {
        self.entries.iter().map(|(k, e)| (k, e.state))
    }

    /// Every resolved entry with its payload and consumers.
    pub fn resolved(&self) -> impl Iterator<Item = (&CanonicalKey, &P, Vec<ConsumerId>)> {
        self.entries.iter().filter_map(|(key, entry)| {
            entry
                .payload
                .as_ref()
                .map(|payload| (key, payload, entry.consumers.iter().cloned().collect()))
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
