//! Cache of prepared feature bags.
//!
//! Keys are `(locale, text)`. Entries live in time buckets of `ttl`
//! seconds: when the current bucket differs from the one the cache was
//! filled in, every entry is dropped. A `ttl` of zero disables the cache.
//! A full cache is also dropped before the next new entry goes in.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use ahash::AHashMap;
use chrono::Utc;
use parking_lot::RwLock;

use crate::neural::features::FeatureVector;

/// Entry count at which [`PrepareCache`] starts over.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Prepared-text cache with coarse time-based invalidation.
#[derive(Debug)]
pub struct PrepareCache {
    entries: RwLock<AHashMap<(String, String), FeatureVector>>,
    ttl_secs: u64,
    max_entries: usize,
    bucket: AtomicI64,
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
}

impl PrepareCache {
    /// Create a cache whose entries expire in `ttl_secs` buckets.
    pub fn new(ttl_secs: u64) -> Self {
        PrepareCache {
            entries: RwLock::new(AHashMap::new()),
            ttl_secs,
            max_entries: DEFAULT_MAX_ENTRIES,
            bucket: AtomicI64::new(Self::bucket_at(Utc::now().timestamp(), ttl_secs)),
            cache_hits: AtomicUsize::new(0),
            cache_misses: AtomicUsize::new(0),
        }
    }

    /// Cap the number of entries kept at once.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    fn bucket_at(timestamp: i64, ttl_secs: u64) -> i64 {
        if ttl_secs == 0 {
            return 0;
        }
        timestamp.div_euclid(ttl_secs as i64)
    }

    /// Drop every entry if `timestamp` falls into a new bucket.
    fn refresh(&self, timestamp: i64) {
        let bucket = Self::bucket_at(timestamp, self.ttl_secs);
        if self.bucket.swap(bucket, Ordering::Relaxed) != bucket {
            self.entries.write().clear();
        }
    }

    pub fn get(&self, locale: &str, text: &str) -> Option<FeatureVector> {
        self.get_at(locale, text, Utc::now().timestamp())
    }

    fn get_at(&self, locale: &str, text: &str, timestamp: i64) -> Option<FeatureVector> {
        if self.ttl_secs == 0 {
            return None;
        }
        self.refresh(timestamp);

        let entries = self.entries.read();
        match entries.get(&(locale.to_string(), text.to_string())) {
            Some(features) => {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                Some(features.clone())
            }
            None => {
                self.cache_misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, locale: &str, text: &str, features: FeatureVector) {
        if self.ttl_secs == 0 {
            return;
        }
        let key = (locale.to_string(), text.to_string());
        let mut entries = self.entries.write();
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            entries.clear();
        }
        entries.insert(key, features);
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.cache_hits.load(Ordering::Relaxed),
            misses: self.cache_misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

/// Cache performance statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: usize,

    /// Number of cache misses.
    pub misses: usize,

    /// Number of cached texts.
    pub entries: usize,
}

impl CacheStats {
    /// Calculate hit ratio.
    pub fn hit_ratio(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}
