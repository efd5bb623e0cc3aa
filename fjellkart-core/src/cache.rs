//! Short-lived, in-memory cache of aggregated POIs keyed by viewport.
//!
//! An entry answers a lookup when it is younger than the TTL, its bounds
//! snapped inward to the quantisation grid contain the requested bounds
//! snapped outward, and it was built for exactly the same category set. Edges
//! within float noise of a grid line count as on it, so an identical or
//! jittered-inside request still hits while any real expansion misses. Partially overlapping entries are never merged.
//! Storage is bounded by an LRU; expired entries are dropped when a lookup
//! notices them.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use log::debug;
use lru::LruCache;
use mockable::DefaultClock;

use crate::{
    Category, DEFAULT_QUANTIZE_PRECISION, Poi, QuantizedBounds, SharedClock, ViewportBounds,
};

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
/// Default number of entries retained.
pub const DEFAULT_MAX_ENTRIES: NonZeroUsize = match NonZeroUsize::new(32) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};

/// Cache sizing and freshness settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    ttl: Duration,
    max_entries: NonZeroUsize,
    precision: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
            precision: DEFAULT_QUANTIZE_PRECISION,
        }
    }
}

impl CacheConfig {
    /// Create a configuration with the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how long an entry stays valid.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the entry cap. Zero is treated as one.
    #[must_use]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        self
    }

    /// Set the number of decimals bounds are quantised to.
    #[must_use]
    pub const fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    /// Entry lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Entry cap.
    #[must_use]
    pub const fn max_entries(&self) -> NonZeroUsize {
        self.max_entries
    }

    /// Quantisation precision in decimal places.
    #[must_use]
    pub const fn precision(&self) -> u32 {
        self.precision
    }
}

/// Identity of a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    bounds: QuantizedBounds,
    categories: Vec<Category>,
}

impl CacheKey {
    /// Build a key, sorting and deduplicating `categories`.
    #[must_use]
    pub fn new(bounds: &ViewportBounds, categories: &[Category], precision: u32) -> Self {
        Self {
            bounds: bounds.quantized(precision),
            categories: category_set(categories),
        }
    }

    /// Quantised bounds.
    #[must_use]
    pub const fn bounds(&self) -> &QuantizedBounds {
        &self.bounds
    }

    /// Sorted, deduplicated categories.
    #[must_use]
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }
}

fn category_set(categories: &[Category]) -> Vec<Category> {
    let mut set = categories.to_vec();
    set.sort_unstable();
    set.dedup();
    set
}

/// One stored aggregation result.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Lookup identity.
    pub key: CacheKey,
    /// Aggregated POIs.
    pub pois: Vec<Poi>,
    /// Bounds as requested, before quantisation.
    pub bounds: ViewportBounds,
    /// When the aggregation completed.
    pub fetched_at: DateTime<Utc>,
    /// Failure message of the pass that produced the entry.
    pub error: Option<String>,
}

/// POIs answered from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    /// Cached POIs.
    pub pois: Vec<Poi>,
    /// When the cached aggregation completed.
    pub fetched_at: DateTime<Utc>,
    /// Failure message stored alongside the POIs, if the pass was partial.
    pub error: Option<String>,
}

/// LRU-bounded viewport cache.
///
/// # Examples
/// ```
/// use fjellkart_core::{Category, ViewportBounds, ViewportCache};
///
/// let mut cache = ViewportCache::default();
/// let outer = ViewportBounds::new(60.0, 59.0, 11.0, 10.0)?;
/// let inner = ViewportBounds::new(59.8, 59.2, 10.8, 10.2)?;
/// cache.store(&outer, &[Category::Peak], Vec::new());
/// assert!(cache.lookup(&inner, &[Category::Peak]).is_some());
/// assert!(cache.lookup(&inner, &[Category::Peak, Category::Beach]).is_none());
/// # Ok::<(), fjellkart_core::BoundsError>(())
/// ```
pub struct ViewportCache {
    config: CacheConfig,
    entries: LruCache<CacheKey, CacheEntry>,
    clock: SharedClock,
}

impl Default for ViewportCache {
    fn default() -> Self {
        Self::new(CacheConfig::default(), Arc::new(DefaultClock))
    }
}

impl std::fmt::Debug for ViewportCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportCache")
            .field("config", &self.config)
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl ViewportCache {
    /// Create an empty cache reading time from `clock`.
    #[must_use]
    pub fn new(config: CacheConfig, clock: SharedClock) -> Self {
        Self {
            entries: LruCache::new(config.max_entries),
            config,
            clock,
        }
    }

    /// Settings in force.
    #[must_use]
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Number of stored entries, fresh or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Find a fresh entry covering `bounds` for exactly `categories`.
    ///
    /// Expired entries are removed as a side effect and a hit is promoted to
    /// most recently used.
    pub fn lookup(&mut self, bounds: &ViewportBounds, categories: &[Category]) -> Option<CacheHit> {
        let precision = self.config.precision;
        let wanted = category_set(categories);
        let covering = bounds.quantized_outward(precision);
        self.evict_expired();
        let key = self
            .entries
            .iter()
            .find(|(key, entry)| {
                key.categories == wanted
                    && entry.bounds.quantized_inward(precision).contains(&covering)
            })
            .map(|(key, _)| key.clone())?;
        let entry = self.entries.get(&key)?;
        debug!(
            "viewport cache hit: {} POIs for {} categories",
            entry.pois.len(),
            key.categories.len()
        );
        Some(CacheHit {
            pois: entry.pois.clone(),
            fetched_at: entry.fetched_at,
            error: entry.error.clone(),
        })
    }

    /// Store `pois` for `bounds` and `categories`, superseding entries for the
    /// same category set whose bounds overlap.
    pub fn store(&mut self, bounds: &ViewportBounds, categories: &[Category], pois: Vec<Poi>) {
        self.store_with_error(bounds, categories, pois, None);
    }

    /// Store the result of a partial pass together with its failure message,
    /// which later hits report again.
    pub fn store_with_error(
        &mut self,
        bounds: &ViewportBounds,
        categories: &[Category],
        pois: Vec<Poi>,
        error: Option<String>,
    ) {
        let key = CacheKey::new(bounds, categories, self.config.precision);
        let superseded: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(other, entry)| {
                other.categories == key.categories && entry.bounds.intersects(bounds)
            })
            .map(|(other, _)| other.clone())
            .collect();
        for other in &superseded {
            self.entries.pop(other);
        }
        let entry = CacheEntry {
            key: key.clone(),
            pois,
            bounds: *bounds,
            fetched_at: self.clock.utc(),
            error,
        };
        self.entries.put(key, entry);
    }

    fn evict_expired(&mut self) {
        let now = self.clock.utc();
        let ttl = TimeDelta::from_std(self.config.ttl).unwrap_or(TimeDelta::MAX);
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| now.signed_duration_since(entry.fetched_at) >= ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.entries.pop(key);
        }
    }
}
