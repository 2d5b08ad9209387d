use crate::cache::key::canonical_key;
use crate::error::PharosError;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::num::NonZeroUsize;

pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Clone, Debug, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub hit_rate: f64,
}

/// Bounded LRU keyed by the canonical serialization of the caller's key.
/// `get` promotes; `has` does not.
pub struct MemoryCache<V> {
    entries: Mutex<LruCache<String, V>>,
    stats: Mutex<CacheStats>,
}

impl<V> MemoryCache<V> {
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries)
            .unwrap_or_else(|| NonZeroUsize::new(DEFAULT_CAPACITY).expect("default is non-zero"));

        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    pub fn set<K: Serialize>(&self, key: &K, value: V) -> Result<(), PharosError> {
        let key = canonical_key(key)?;
        self.set_raw(key, value);
        Ok(())
    }

    pub fn get<K: Serialize>(&self, key: &K) -> Result<Option<V>, PharosError>
    where
        V: Clone,
    {
        let key = canonical_key(key)?;
        Ok(self.get_raw(&key))
    }

    pub fn has<K: Serialize>(&self, key: &K) -> Result<bool, PharosError> {
        let key = canonical_key(key)?;
        Ok(self.entries.lock().contains(&key))
    }

    pub fn remove<K: Serialize>(&self, key: &K) -> Result<Option<V>, PharosError> {
        let key = canonical_key(key)?;
        let removed = self.entries.lock().pop(&key);
        self.update_entry_count();
        Ok(removed)
    }

    pub fn set_raw(&self, key: String, value: V) {
        let mut entries = self.entries.lock();
        if entries.len() == entries.cap().get() && !entries.contains(&key) {
            self.stats.lock().evictions += 1;
        }
        entries.put(key, value);
        drop(entries);
        self.update_entry_count();
    }

    pub fn get_raw(&self, key: &str) -> Option<V>
    where
        V: Clone,
    {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(value) => {
                let value = value.clone();
                drop(entries);
                self.record_hit();
                Some(value)
            }
            None => {
                drop(entries);
                self.record_miss();
                None
            }
        }
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
        let mut stats = self.stats.lock();
        stats.entries = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }

    fn record_hit(&self) {
        let mut stats = self.stats.lock();
        stats.hits += 1;
        Self::update_hit_rate(&mut stats);
    }

    fn record_miss(&self) {
        let mut stats = self.stats.lock();
        stats.misses += 1;
        Self::update_hit_rate(&mut stats);
    }

    fn update_hit_rate(stats: &mut CacheStats) {
        let total = stats.hits + stats.misses;
        if total > 0 {
            stats.hit_rate = stats.hits as f64 / total as f64;
        }
    }

    fn update_entry_count(&self) {
        let len = self.entries.lock().len();
        self.stats.lock().entries = len;
    }
}

impl<V> Default for MemoryCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
