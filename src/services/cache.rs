//! TTL cache shared by every caller of the pipeline.
//!
//! Entries are checked for expiry at read time and dropped lazily; there is
//! no background sweep. The map is bounded, evicting least recently used
//! entries once `max_entries` is reached.

use lru::LruCache;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::models::location::LocationQuery;
use crate::models::weather::{ForecastSnapshot, WeatherSnapshot};

/// Operation kinds that own a slice of the key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOperation {
    Current,
    Forecast,
    Historical,
    MultiCity,
}

impl CacheOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOperation::Current => "current",
            CacheOperation::Forecast => "forecast",
            CacheOperation::Historical => "historical",
            CacheOperation::MultiCity => "multi_city",
        }
    }
}

/// Per-operation TTLs and the entry bound.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheTtlConfig {
    pub current: Duration,
    pub forecast: Duration,
    pub historical: Duration,
    pub multi_city: Duration,
    pub max_entries: usize,
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            current: Duration::from_secs(10 * 60),
            forecast: Duration::from_secs(30 * 60),
            historical: Duration::from_secs(60 * 60),
            multi_city: Duration::from_secs(10 * 60),
            max_entries: 1000,
        }
    }
}

impl CacheTtlConfig {
    pub fn ttl_for(&self, operation: CacheOperation) -> Duration {
        match operation {
            CacheOperation::Current => self.current,
            CacheOperation::Forecast => self.forecast,
            CacheOperation::Historical => self.historical,
            CacheOperation::MultiCity => self.multi_city,
        }
    }
}

/// Deterministic cache key derived from operation, location identity and an
/// optional day count.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(operation: CacheOperation, location: &LocationQuery, days: Option<u32>) -> Self {
        Self::from_parts(operation, &location.identity(), days)
    }

    /// Key for a set of locations; order and duplicates do not matter.
    pub fn for_locations(locations: &[LocationQuery]) -> Self {
        let mut identities: Vec<String> = locations.iter().map(LocationQuery::identity).collect();
        identities.sort();
        identities.dedup();
        Self::from_parts(CacheOperation::MultiCity, &identities.join("|"), None)
    }

    fn from_parts(operation: CacheOperation, identity: &str, days: Option<u32>) -> Self {
        match days {
            Some(days) => Self(format!("{}:{}:{}d", operation.as_str(), identity, days)),
            None => Self(format!("{}:{}", operation.as_str(), identity)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Values the pipeline stores.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedPayload {
    Current(WeatherSnapshot),
    Forecast(ForecastSnapshot),
    MultiCity(Vec<WeatherSnapshot>),
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.stored_at + self.ttl
    }
}

/// Thread-safe TTL store. Clones share the same underlying map.
pub struct CacheStore<V = CachedPayload> {
    entries: Arc<Mutex<LruCache<CacheKey, CacheEntry<V>>>>,
}

impl<V> Clone for CacheStore<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<V: Clone> CacheStore<V> {
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the live value for `key`, dropping it if it has expired.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let mut entries = self.lock();
        let now = Instant::now();
        let lookup = entries
            .get(key)
            .map(|entry| entry.is_live(now).then(|| entry.value.clone()));
        match lookup {
            Some(Some(value)) => Some(value),
            Some(None) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, key: CacheKey, value: V, ttl: Duration) {
        self.lock().put(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    pub fn delete(&self, key: &CacheKey) {
        self.lock().pop(key);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
