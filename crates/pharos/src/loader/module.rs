use crate::config::LoaderConfig;
use crate::error::PharosError;
use crate::loader::task::{LoadState, LoaderStats, RetryPolicy};
use crate::telemetry::{LogEvent, LogLevel, Logger};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::timeout;

type SharedLoad<T> = Shared<BoxFuture<'static, Result<T, PharosError>>>;

/// Per-call overrides of the loader's retry policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    pub max_retries: Option<u32>,
    pub retry_delay: Option<Duration>,
}

struct TaskEntry<T: Clone> {
    future: SharedLoad<T>,
    state: watch::Sender<LoadState>,
    attempts: Arc<AtomicU32>,
}

/// Observer handle for one keyed load. Cheap to clone out of the dedup map;
/// `wait` resolves to the shared outcome.
pub struct LoadHandle<T: Clone> {
    key: String,
    future: SharedLoad<T>,
    states: watch::Receiver<LoadState>,
    attempts: Arc<AtomicU32>,
}

impl<T: Clone> LoadHandle<T> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> LoadState {
        self.states.borrow().clone()
    }

    pub fn states(&self) -> watch::Receiver<LoadState> {
        self.states.clone()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub async fn wait(self) -> Result<T, PharosError> {
        self.future.await
    }
}

/// Single-flight keyed loader. Every caller of `load` for the same key gets
/// a handle onto one shared driver future: the first call runs the factory
/// with bounded linear-backoff retries, later calls observe its progress and
/// outcome. A task that ends in `Error` stays terminal, replaying the error
/// to new callers, until `retry` clears it.
pub struct ModuleLoader<T: Clone + Send + Sync + 'static> {
    tasks: DashMap<String, TaskEntry<T>>,
    policy: RetryPolicy,
    load_timeout: Duration,
    logger: Option<Arc<Logger>>,
    stats: Arc<Mutex<LoaderStats>>,
}

impl<T: Clone + Send + Sync + 'static> ModuleLoader<T> {
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            tasks: DashMap::new(),
            policy: RetryPolicy::linear(
                config.max_retries,
                Duration::from_millis(config.retry_delay_ms),
            ),
            load_timeout: Duration::from_millis(config.load_timeout_ms),
            logger: None,
            stats: Arc::new(Mutex::new(LoaderStats::default())),
        }
    }

    pub fn with_logger(mut self, logger: Arc<Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn load<F, Fut>(&self, key: &str, factory: F) -> LoadHandle<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, PharosError>> + Send + 'static,
    {
        self.load_with(key, factory, LoadOptions::default())
    }

    pub fn load_with<F, Fut>(&self, key: &str, factory: F, options: LoadOptions) -> LoadHandle<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, PharosError>> + Send + 'static,
    {
        let entry = match self.tasks.entry(key.to_string()) {
            Entry::Occupied(occupied) => {
                self.stats.lock().dedup_hits += 1;
                occupied.into_ref()
            }
            Entry::Vacant(vacant) => {
                self.stats.lock().started += 1;
                vacant.insert(self.make_task(key, factory, options))
            }
        };

        LoadHandle {
            key: key.to_string(),
            future: entry.future.clone(),
            states: entry.state.subscribe(),
            attempts: Arc::clone(&entry.attempts),
        }
    }

    /// Current state for a key; `Idle` when nothing has been requested.
    pub fn state(&self, key: &str) -> LoadState {
        self.tasks.get(key).map_or(LoadState::Idle, |e| e.state.borrow().clone())
    }

    pub fn attempts(&self, key: &str) -> u32 {
        self.tasks.get(key).map_or(0, |e| e.attempts.load(Ordering::SeqCst))
    }

    /// Clears a task whose error became terminal so the next `load` starts
    /// fresh. Returns false when the key is absent or not in `Error`.
    pub fn retry(&self, key: &str) -> bool {
        match self.tasks.remove_if(key, |_, entry| entry.state.borrow().is_error()) {
            Some((_, entry)) => {
                let _ = entry.state.send(LoadState::Idle);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn stats(&self) -> LoaderStats {
        self.stats.lock().clone()
    }

    fn make_task<F, Fut>(&self, key: &str, factory: F, options: LoadOptions) -> TaskEntry<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, PharosError>> + Send + 'static,
    {
        let (state, _) = watch::channel(LoadState::Idle);
        let attempts = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy {
            max_retries: options.max_retries.unwrap_or(self.policy.max_retries),
            base_delay: options.retry_delay.unwrap_or(self.policy.base_delay),
            backoff: self.policy.backoff,
        };

        let driver = drive_load(
            key.to_string(),
            factory,
            policy,
            self.load_timeout,
            state.clone(),
            Arc::clone(&attempts),
            self.logger.clone(),
            Arc::clone(&self.stats),
        );

        TaskEntry { future: driver.boxed().shared(), state, attempts }
    }
}

#[allow(clippy::too_many_arguments)]
async fn drive_load<T, F, Fut>(
    key: String,
    factory: F,
    policy: RetryPolicy,
    load_timeout: Duration,
    state: watch::Sender<LoadState>,
    attempts: Arc<AtomicU32>,
    logger: Option<Arc<Logger>>,
    stats: Arc<Mutex<LoaderStats>>,
) -> Result<T, PharosError>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, PharosError>> + Send + 'static,
{
    let started = Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        attempts.store(attempt, Ordering::SeqCst);
        let _ = state.send(LoadState::Loading);

        let outcome = match timeout(load_timeout, factory()).await {
            Ok(result) => result,
            Err(elapsed) => Err(PharosError::from(elapsed)),
        };

        match outcome {
            Ok(value) => {
                let _ = state.send(LoadState::Loaded);
                stats.lock().completed += 1;
                if let Some(logger) = &logger {
                    logger.log(
                        LogLevel::Info,
                        format!("module loaded: {key}"),
                        Some(LogEvent::Custom {
                            name: "module_loaded".to_string(),
                            data: serde_json::json!({
                                "key": key,
                                "attempts": attempt,
                                "duration_ms": started.elapsed().as_millis() as u64,
                            }),
                        }),
                    );
                }
                return Ok(value);
            }
            Err(e) if attempt < policy.max_retries => {
                let _ = state.send(LoadState::Retrying);
                stats.lock().retries += 1;
                tracing::debug!(key = %key, attempt, error = %e, "module load retrying");
                tokio::time::sleep(policy.delay(attempt)).await;
            }
            Err(e) => {
                let _ = state.send(LoadState::Error { message: e.message() });
                stats.lock().failed += 1;
                if let Some(logger) = &logger {
                    logger.log(
                        LogLevel::Error,
                        format!("module load failed: {key}"),
                        Some(LogEvent::ResourceError {
                            url: key.clone(),
                            message: e.message(),
                            attempts: Some(attempt),
                        }),
                    );
                }
                return Err(e);
            }
        }
    }
}
