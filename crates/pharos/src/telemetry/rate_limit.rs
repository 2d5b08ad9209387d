use crate::telemetry::entry::LogLevel;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Sliding-window limiter keyed by `(level, message)`. Bounds how often one
/// identical line can reach the sinks; the key table itself is LRU-bounded so
/// unbounded distinct messages cannot grow memory.
#[derive(Clone)]
pub struct LogRateLimiter {
    entries: Arc<Mutex<LruCache<String, (u32, Instant)>>>,
    max_per_window: u32,
    window: Duration,
}

impl LogRateLimiter {
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self::with_capacity(max_per_window, window, 1024)
    }

    pub fn with_capacity(max_per_window: u32, window: Duration, max_tracked_keys: usize) -> Self {
        let capacity = NonZeroUsize::new(max_tracked_keys)
            .unwrap_or_else(|| NonZeroUsize::new(1024).expect("1024 is non-zero"));
        Self {
            entries: Arc::new(Mutex::new(LruCache::new(capacity))),
            max_per_window,
            window,
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    /// True when this `(level, message)` is still within its budget for the
    /// current window.
    pub fn check(&self, level: LogLevel, message: &str) -> bool {
        let key = format!("{}:{message}", level.as_str());
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if let Some((count, window_start)) = entries.get_mut(&key) {
            let elapsed = now.duration_since(*window_start);

            if elapsed >= self.window {
                *count = 1;
                *window_start = now;
                true
            } else if *count >= self.max_per_window {
                false
            } else {
                *count += 1;
                true
            }
        } else {
            entries.put(key, (1, now));
            true
        }
    }

    pub fn cleanup(&self) {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let expired: Vec<String> = entries
            .iter()
            .filter_map(|(key, (_, window_start))| {
                if now.duration_since(*window_start) >= self.window * 2 {
                    Some(key.clone())
                } else {
                    None
                }
            })
            .collect();

        for key in expired {
            entries.pop(&key);
        }
    }

    pub fn start_cleanup_task(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        let limiter = self;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                limiter.cleanup();
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_under_limit() {
        let limiter = LogRateLimiter::new(5, Duration::from_secs(60));

        for _ in 0..5 {
            assert!(limiter.check(LogLevel::Info, "cache miss"));
        }
    }

    #[test]
    fn test_blocks_over_limit() {
        let limiter = LogRateLimiter::new(3, Duration::from_secs(60));

        assert!(limiter.check(LogLevel::Warn, "slow frame"));
        assert!(limiter.check(LogLevel::Warn, "slow frame"));
        assert!(limiter.check(LogLevel::Warn, "slow frame"));
        assert!(!limiter.check(LogLevel::Warn, "slow frame"));
    }

    #[test]
    fn test_distinct_messages_have_separate_budgets() {
        let limiter = LogRateLimiter::new(2, Duration::from_secs(60));

        assert!(limiter.check(LogLevel::Info, "first"));
        assert!(limiter.check(LogLevel::Info, "first"));
        assert!(!limiter.check(LogLevel::Info, "first"));

        assert!(limiter.check(LogLevel::Info, "second"));
        assert!(limiter.check(LogLevel::Info, "second"));
    }

    #[test]
    fn test_same_message_different_levels_are_distinct() {
        let limiter = LogRateLimiter::new(1, Duration::from_secs(60));

        assert!(limiter.check(LogLevel::Info, "boom"));
        assert!(limiter.check(LogLevel::Error, "boom"));
        assert!(!limiter.check(LogLevel::Info, "boom"));
    }

    #[test]
    fn test_window_resets_budget() {
        let limiter = LogRateLimiter::new(1, Duration::from_millis(30));

        assert!(limiter.check(LogLevel::Info, "tick"));
        assert!(!limiter.check(LogLevel::Info, "tick"));

        std::thread::sleep(Duration::from_millis(50));

        assert!(limiter.check(LogLevel::Info, "tick"));
    }

    #[test]
    fn test_cleanup_removes_stale_keys() {
        let limiter = LogRateLimiter::new(5, Duration::from_millis(20));

        limiter.check(LogLevel::Info, "old");
        std::thread::sleep(Duration::from_millis(60));
        limiter.cleanup();

        let entries = limiter.entries.lock();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_key_table_is_bounded() {
        let limiter = LogRateLimiter::with_capacity(5, Duration::from_secs(60), 3);

        for i in 0..100 {
            assert!(limiter.check(LogLevel::Debug, &format!("message {i}")));
        }

        let entries = limiter.entries.lock();
        assert_eq!(entries.len(), 3);
    }
}
