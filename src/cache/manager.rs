//! Cache manager: four isolated stores behind one handle.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::backend::{CacheStats, LruTtlCache};
use super::clock::{Clock, SystemClock};
use super::key::CacheKey;

/// Loads in flight at once during [`ResponseCache::preload`].
pub const PRELOAD_CONCURRENCY: usize = 3;

/// Which sub-cache an entry lives in. Each kind has its own key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    /// Full generations.
    Generation,
    /// Script analysis reports.
    Analysis,
    /// Visualization sets.
    Visualization,
    /// Raw prompts.
    Prompt,
}

impl CacheKind {
    pub const ALL: [CacheKind; 4] = [
        CacheKind::Generation,
        CacheKind::Analysis,
        CacheKind::Visualization,
        CacheKind::Prompt,
    ];

    pub fn namespace(&self) -> &'static str {
        match self {
            CacheKind::Generation => "generation",
            CacheKind::Analysis => "analysis",
            CacheKind::Visualization => "visualization",
            CacheKind::Prompt => "prompt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub capacity: usize,
    /// Default lifetime of an entry; `None` never expires.
    pub ttl_secs: Option<u64>,
}

impl StoreConfig {
    pub fn new(capacity: usize, ttl_secs: u64) -> Self {
        Self {
            capacity,
            ttl_secs: Some(ttl_secs),
        }
    }

    fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}

/// Per-kind store settings. In a config file each store may name only the
/// fields it changes; the others keep that kind's default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CacheConfigFile")]
pub struct CacheConfig {
    pub generation: StoreConfig,
    pub analysis: StoreConfig,
    pub visualization: StoreConfig,
    pub prompt: StoreConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            generation: StoreConfig::new(150, 3600),
            analysis: StoreConfig::new(100, 1800),
            visualization: StoreConfig::new(60, 900),
            prompt: StoreConfig::new(120, 7200),
        }
    }
}

impl CacheConfig {
    pub fn store(&self, kind: CacheKind) -> StoreConfig {
        match kind {
            CacheKind::Generation => self.generation,
            CacheKind::Analysis => self.analysis,
            CacheKind::Visualization => self.visualization,
            CacheKind::Prompt => self.prompt,
        }
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct CacheConfigFile {
    generation: Option<StoreOverride>,
    analysis: Option<StoreOverride>,
    visualization: Option<StoreOverride>,
    prompt: Option<StoreOverride>,
}

#[derive(Deserialize)]
struct StoreOverride {
    capacity: Option<usize>,
    /// Outer `None` means absent; `Some(None)` is an explicit `null`.
    #[serde(default, deserialize_with = "present")]
    ttl_secs: Option<Option<u64>>,
}

fn present<'de, D>(d: D) -> Result<Option<Option<u64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<u64>::deserialize(d).map(Some)
}

impl StoreOverride {
    fn over(self, base: StoreConfig) -> StoreConfig {
        StoreConfig {
            capacity: self.capacity.unwrap_or(base.capacity),
            ttl_secs: self.ttl_secs.unwrap_or(base.ttl_secs),
        }
    }
}

impl From<CacheConfigFile> for CacheConfig {
    fn from(file: CacheConfigFile) -> Self {
        let base = CacheConfig::default();
        let pick = |o: Option<StoreOverride>, d: StoreConfig| o.map_or(d, |o| o.over(d));
        Self {
            generation: pick(file.generation, base.generation),
            analysis: pick(file.analysis, base.analysis),
            visualization: pick(file.visualization, base.visualization),
            prompt: pick(file.prompt, base.prompt),
        }
    }
}

/// One tuning hint produced by [`ResponseCache::recommendations`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheRecommendation {
    pub kind: CacheKind,
    pub message: String,
}

/// Memoization for generation results.
///
/// Values are stored as JSON so every kind can hold whatever the caller
/// produced. Nothing here returns an error: a key that cannot be built or
/// a value that cannot be converted reads as a miss and writes as a no-op.
pub struct ResponseCache {
    generation: LruTtlCache<Value>,
    analysis: LruTtlCache<Value>,
    visualization: LruTtlCache<Value>,
    prompt: LruTtlCache<Value>,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let build = |kind: CacheKind| {
            let sc = config.store(kind);
            LruTtlCache::with_clock(sc.capacity, sc.ttl(), clock.clone())
        };
        Self {
            generation: build(CacheKind::Generation),
            analysis: build(CacheKind::Analysis),
            visualization: build(CacheKind::Visualization),
            prompt: build(CacheKind::Prompt),
        }
    }

    pub fn store(&self, kind: CacheKind) -> &LruTtlCache<Value> {
        match kind {
            CacheKind::Generation => &self.generation,
            CacheKind::Analysis => &self.analysis,
            CacheKind::Visualization => &self.visualization,
            CacheKind::Prompt => &self.prompt,
        }
    }

    fn params_key<P: Serialize + ?Sized>(kind: CacheKind, params: &P) -> Option<CacheKey> {
        match CacheKey::from_params(kind.namespace(), params) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(kind = kind.namespace(), error = %e, "cache key unavailable");
                None
            }
        }
    }

    pub fn get<P: Serialize + ?Sized>(&self, kind: CacheKind, params: &P) -> Option<Value> {
        let store = self.store(kind);
        match Self::params_key(kind, params) {
            Some(key) => {
                let hit = store.get(&key);
                debug!(kind = kind.namespace(), hit = hit.is_some(), "cache lookup");
                hit
            }
            None => {
                store.record_miss();
                None
            }
        }
    }

    pub fn set<P: Serialize + ?Sized>(&self, kind: CacheKind, params: &P, value: Value) {
        if let Some(key) = Self::params_key(kind, params) {
            self.store(kind).set(key, value);
        }
    }

    /// Store with an explicit lifetime. `ttl = None` never expires.
    pub fn set_with_ttl<P: Serialize + ?Sized>(
        &self,
        kind: CacheKind,
        params: &P,
        value: Value,
        ttl: Option<Duration>,
    ) {
        if let Some(key) = Self::params_key(kind, params) {
            self.store(kind).set_with_ttl(key, value, ttl);
        }
    }

    /// Look up by free text. Whitespace differences do not matter.
    pub fn get_text(&self, kind: CacheKind, text: &str) -> Option<Value> {
        self.store(kind)
            .get(&CacheKey::from_text(kind.namespace(), text))
    }

    pub fn set_text(&self, kind: CacheKind, text: &str, value: Value) {
        self.store(kind)
            .set(CacheKey::from_text(kind.namespace(), text), value);
    }

    pub fn delete<P: Serialize + ?Sized>(&self, kind: CacheKind, params: &P) -> bool {
        Self::params_key(kind, params)
            .map(|key| self.store(kind).delete(&key))
            .unwrap_or(false)
    }

    pub fn stats(&self, kind: CacheKind) -> CacheStats {
        self.store(kind).stats()
    }

    pub fn all_stats(&self) -> Vec<(CacheKind, CacheStats)> {
        CacheKind::ALL.iter().map(|k| (*k, self.stats(*k))).collect()
    }

    /// Purge expired entries from every store. Returns the total removed.
    pub fn cleanup(&self) -> usize {
        let removed: usize = CacheKind::ALL.iter().map(|k| self.store(*k).cleanup()).sum();
        if removed > 0 {
            info!(removed, "purged expired cache entries");
        }
        removed
    }

    pub fn clear_all(&self) {
        for kind in CacheKind::ALL {
            self.store(kind).clear();
        }
        info!("all caches cleared");
    }

    /// Tuning hints for stores that have seen at least one lookup: a hit
    /// rate under 30%, or evictions above 10% of hits.
    pub fn recommendations(&self) -> Vec<CacheRecommendation> {
        let mut out = Vec::new();
        for (kind, s) in self.all_stats() {
            if s.lookups() == 0 {
                continue;
            }
            if s.hit_rate < 0.3 {
                out.push(CacheRecommendation {
                    kind,
                    message: format!(
                        "{} cache hit rate is low ({:.1}%); consider a longer TTL",
                        kind.namespace(),
                        s.hit_rate * 100.0
                    ),
                });
            }
            if s.evictions as f64 > s.hits as f64 * 0.1 {
                out.push(CacheRecommendation {
                    kind,
                    message: format!(
                        "{} cache evicts often ({} evictions); consider a larger capacity",
                        kind.namespace(),
                        s.evictions
                    ),
                });
            }
        }
        out
    }

    /// Fill the generation store for every parameter set not already cached.
    ///
    /// Runs at most [`PRELOAD_CONCURRENCY`] loads at once. A failed load is
    /// logged and skipped. Returns how many entries were stored.
    pub async fn preload<P, F, Fut, E>(&self, params_list: Vec<P>, loader: F) -> usize
    where
        P: Serialize,
        F: Fn(&P) -> Fut,
        Fut: Future<Output = Result<Value, E>>,
        E: std::fmt::Display,
    {
        let kind = CacheKind::Generation;
        let pending: Vec<(CacheKey, P)> = params_list
            .into_iter()
            .filter_map(|p| Self::params_key(kind, &p).map(|k| (k, p)))
            .filter(|(k, _)| !self.generation.contains(k))
            .collect();
        if pending.is_empty() {
            return 0;
        }
        info!(count = pending.len(), "preloading generation cache");

        let loader = &loader;
        let loaded: Vec<Option<(CacheKey, Value)>> = stream::iter(pending)
            .map(|(key, params)| async move {
                match loader(&params).await {
                    Ok(value) => Some((key, value)),
                    Err(e) => {
                        warn!(key = %key, error = %e, "preload failed");
                        None
                    }
                }
            })
            .buffer_unordered(PRELOAD_CONCURRENCY)
            .collect()
            .await;

        let mut stored = 0;
        for (key, value) in loaded.into_iter().flatten() {
            self.generation.set(key, value);
            stored += 1;
        }
        stored
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
