//! Bounded LRU store with per-entry expiry.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::warn;

use super::clock::{Clock, SystemClock};
use super::key::CacheKey;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |at| now >= at)
    }
}

/// Snapshot of one store's counters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// `hits / (hits + misses)`, zero before the first lookup.
    pub hit_rate: f64,
}

impl CacheStats {
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl AtomicStats {
    fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}

/// LRU cache whose entries may also expire.
///
/// An expired entry reads as absent even before [`LruTtlCache::cleanup`]
/// removes it. Inserting a new key into a full store evicts exactly the
/// least recently used entry. A capacity of zero disables the store: every
/// read misses and every write is dropped.
pub struct LruTtlCache<V> {
    entries: Mutex<Option<LruCache<CacheKey, CacheEntry<V>>>>,
    capacity: usize,
    default_ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
    stats: AtomicStats,
}

impl<V: Clone> LruTtlCache<V> {
    pub fn new(capacity: usize, default_ttl: Option<Duration>) -> Self {
        Self::with_clock(capacity, default_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: usize, default_ttl: Option<Duration>, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(NonZeroUsize::new(capacity).map(LruCache::new)),
            capacity,
            default_ttl,
            clock,
            stats: AtomicStats::default(),
        }
    }

    fn lock(&self) -> Option<MutexGuard<'_, Option<LruCache<CacheKey, CacheEntry<V>>>>> {
        match self.entries.lock() {
            Ok(guard) => Some(guard),
            Err(_) => {
                warn!("cache lock poisoned, treating access as a miss");
                None
            }
        }
    }

    /// Look up `key`, promoting it to most recently used on a hit.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let now = self.clock.now();
        let found = self.lock().and_then(|mut guard| {
            let map = guard.as_mut()?;
            let expired = map.peek(key)?.is_expired(now);
            if expired {
                map.pop(key);
                return None;
            }
            map.get(key).map(|e| e.value.clone())
        });
        match found {
            Some(_) => self.stats.hits.fetch_add(1, Ordering::Relaxed),
            None => self.stats.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Presence check that neither promotes nor counts.
    pub fn contains(&self, key: &CacheKey) -> bool {
        let now = self.clock.now();
        self.lock()
            .and_then(|guard| {
                guard
                    .as_ref()
                    .and_then(|map| map.peek(key).map(|e| !e.is_expired(now)))
            })
            .unwrap_or(false)
    }

    pub fn set(&self, key: CacheKey, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Store `value`. `ttl = None` never expires, and neither does a TTL too
    /// long to represent as an instant. Replacing an existing key promotes it
    /// without evicting anything.
    pub fn set_with_ttl(&self, key: CacheKey, value: V, ttl: Option<Duration>) {
        let now = self.clock.now();
        let entry = CacheEntry {
            value,
            inserted_at: now,
            expires_at: ttl.and_then(|t| now.checked_add(t)),
        };
        let Some(mut guard) = self.lock() else {
            return;
        };
        let Some(map) = guard.as_mut() else {
            return;
        };
        if map.contains(&key) {
            map.put(key, entry);
        } else if let Some((evicted, old)) = map.push(key, entry) {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                key = %evicted,
                age_ms = now.saturating_duration_since(old.inserted_at).as_millis() as u64,
                "evicted least recently used entry"
            );
        }
    }

    pub fn delete(&self, key: &CacheKey) -> bool {
        self.lock()
            .and_then(|mut guard| guard.as_mut().and_then(|map| map.pop(key)))
            .is_some()
    }

    /// Remove every entry and reset the counters.
    pub fn clear(&self) {
        if let Some(mut guard) = self.lock() {
            if let Some(map) = guard.as_mut() {
                map.clear();
            }
        }
        self.stats.reset();
    }

    /// Purge all expired entries. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let Some(mut guard) = self.lock() else {
            return 0;
        };
        let Some(map) = guard.as_mut() else {
            return 0;
        };
        let expired: Vec<CacheKey> = map
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for k in &expired {
            map.pop(k);
        }
        expired.len()
    }

    /// Live keys, most recently used first.
    pub fn keys(&self) -> Vec<CacheKey> {
        let now = self.clock.now();
        self.lock()
            .and_then(|guard| {
                guard.as_ref().map(|map| {
                    map.iter()
                        .filter(|(_, e)| !e.is_expired(now))
                        .map(|(k, _)| k.clone())
                        .collect()
                })
            })
            .unwrap_or_default()
    }

    /// Stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.lock()
            .and_then(|guard| guard.as_ref().map(LruCache::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Count a lookup that failed before reaching the store.
    pub fn record_miss(&self) {
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.stats.hits.load(Ordering::Relaxed);
        let misses = self.stats.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            size: self.len(),
            capacity: self.capacity,
            hits,
            misses,
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }
}
