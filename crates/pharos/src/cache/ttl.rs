use crate::cache::key::canonical_key;
use crate::cache::memory::CacheStats;
use crate::error::PharosError;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
struct TtlEntry<V> {
    value: V,
    stored_at: Instant,
}

/// LRU cache where entries also age out; an expired entry counts as a miss
/// and is dropped on access.
pub struct TtlCache<V> {
    entries: Mutex<LruCache<String, TtlEntry<V>>>,
    stats: Mutex<CacheStats>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries)
            .unwrap_or_else(|| NonZeroUsize::new(super::memory::DEFAULT_CAPACITY).expect("default is non-zero"));

        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            stats: Mutex::new(CacheStats::default()),
            ttl,
        }
    }

    pub fn set<K: Serialize>(&self, key: &K, value: V) -> Result<(), PharosError> {
        let key = canonical_key(key)?;
        let mut entries = self.entries.lock();
        if entries.len() == entries.cap().get() && !entries.contains(&key) {
            self.stats.lock().evictions += 1;
        }
        entries.put(key, TtlEntry { value, stored_at: Instant::now() });
        let len = entries.len();
        drop(entries);
        self.stats.lock().entries = len;
        Ok(())
    }

    pub fn get<K: Serialize>(&self, key: &K) -> Result<Option<V>, PharosError> {
        let key = canonical_key(key)?;
        let mut entries = self.entries.lock();

        let expired = match entries.get(&key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                let value = entry.value.clone();
                drop(entries);
                self.record(true);
                return Ok(Some(value));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(&key);
        }
        drop(entries);
        self.record(false);
        Ok(None)
    }

    /// Returns the cached value when fresh, otherwise runs `fetch` and caches
    /// the result. Concurrent callers may fetch independently; the dedup
    /// guarantee lives in the loader, not here.
    pub async fn get_or_fetch<K, F, Fut>(&self, key: &K, fetch: F) -> Result<V, PharosError>
    where
        K: Serialize,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<V, PharosError>>,
    {
        if let Some(value) = self.get(key)? {
            return Ok(value);
        }

        let value = fetch().await?;
        self.set(key, value.clone())?;
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
        self.stats.lock().entries = 0;
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }

    fn record(&self, hit: bool) {
        let mut stats = self.stats.lock();
        if hit {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        let total = stats.hits + stats.misses;
        if total > 0 {
            stats.hit_rate = stats.hits as f64 / total as f64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache: TtlCache<String> = TtlCache::new(10, Duration::from_millis(30));
        cache.set(&"k", "v".to_string()).unwrap();

        assert_eq!(cache.get(&"k").unwrap().as_deref(), Some("v"));

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(cache.get(&"k").unwrap().is_none());
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_get_or_fetch_fetches_once_while_fresh() {
        let cache: TtlCache<u32> = TtlCache::new(10, Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_fetch(&"answer", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await
                .unwrap();
            assert_eq!(value, 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_or_fetch_refetches_after_expiry() {
        let cache: TtlCache<u32> = TtlCache::new(10, Duration::from_millis(20));
        let calls = AtomicUsize::new(0);

        let fetch = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        };

        cache.get_or_fetch(&"k", fetch).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        cache.get_or_fetch(&"k", fetch).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_error_propagates_and_caches_nothing() {
        let cache: TtlCache<u32> = TtlCache::new(10, Duration::from_secs(60));

        let result = cache
            .get_or_fetch(&"k", || async { Err(PharosError::network("offline")) })
            .await;

        assert!(result.is_err());
        assert!(cache.is_empty());
    }
}
