use crate::bridge::{ResourceFetcher, VisibilityGate};
use crate::cache::MemoryCache;
use crate::config::LoaderConfig;
use crate::error::PharosError;
use crate::loader::task::{LoaderStats, RetryPolicy};
use crate::telemetry::{LogEvent, LogLevel, Logger};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::timeout;

/// What a consumer should currently display for one image slot.
///
/// Once a frame has been delivered the phase never goes back to something
/// blank: a failed full-quality fetch after a low-quality frame leaves the
/// placeholder in place, and the failure surfaces only through the task
/// result.
#[derive(Debug, Clone, PartialEq)]
pub enum ImagePhase {
    Pending,
    Loading,
    LowQuality(Bytes),
    Full(Bytes),
    Failed(String),
}

impl ImagePhase {
    pub fn bytes(&self) -> Option<&Bytes> {
        match self {
            ImagePhase::LowQuality(bytes) | ImagePhase::Full(bytes) => Some(bytes),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImageLoadOptions {
    /// Critical images skip visibility gating entirely.
    pub critical: bool,
    /// Optional placeholder fetched first and displayed until the full image
    /// arrives. Placeholder failures are non-fatal.
    pub low_quality_src: Option<String>,
}

/// One in-flight image load. The future is lazy; consumers subscribe to
/// `phases` before awaiting `wait`.
pub struct ImageTask {
    src: String,
    phases: watch::Receiver<ImagePhase>,
    future: BoxFuture<'static, Result<Bytes, PharosError>>,
}

impl ImageTask {
    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn phase(&self) -> ImagePhase {
        self.phases.borrow().clone()
    }

    pub fn phases(&self) -> watch::Receiver<ImagePhase> {
        self.phases.clone()
    }

    pub async fn wait(self) -> Result<Bytes, PharosError> {
        self.future.await
    }
}

/// Visibility-gated image loader with exponential-backoff retries and an
/// optional byte cache shared with the preloader. Already-cached sources
/// resolve immediately, visible or not.
pub struct ImageLoader {
    fetcher: Arc<dyn ResourceFetcher>,
    gate: Arc<dyn VisibilityGate>,
    policy: RetryPolicy,
    load_timeout: Duration,
    cache: Option<Arc<MemoryCache<Bytes>>>,
    logger: Option<Arc<Logger>>,
    stats: Arc<Mutex<LoaderStats>>,
}

impl ImageLoader {
    pub fn new(
        fetcher: Arc<dyn ResourceFetcher>,
        gate: Arc<dyn VisibilityGate>,
        config: &LoaderConfig,
    ) -> Self {
        Self {
            fetcher,
            gate,
            policy: RetryPolicy::exponential(
                config.max_retries,
                Duration::from_millis(config.image_retry_base_ms),
            ),
            load_timeout: Duration::from_millis(config.load_timeout_ms),
            cache: None,
            logger: None,
            stats: Arc::new(Mutex::new(LoaderStats::default())),
        }
    }

    pub fn with_cache(mut self, cache: Arc<MemoryCache<Bytes>>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_logger(mut self, logger: Arc<Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn stats(&self) -> LoaderStats {
        self.stats.lock().clone()
    }

    pub fn load(&self, src: &str, options: ImageLoadOptions) -> ImageTask {
        self.stats.lock().started += 1;

        let (phase_tx, phase_rx) = watch::channel(ImagePhase::Pending);
        let src = src.to_string();
        let future = drive_image(
            src.clone(),
            options,
            Arc::clone(&self.fetcher),
            Arc::clone(&self.gate),
            self.policy,
            self.load_timeout,
            self.cache.clone(),
            self.logger.clone(),
            Arc::clone(&self.stats),
            phase_tx,
        )
        .boxed();

        ImageTask { src, phases: phase_rx, future }
    }
}

#[allow(clippy::too_many_arguments)]
async fn drive_image(
    src: String,
    options: ImageLoadOptions,
    fetcher: Arc<dyn ResourceFetcher>,
    gate: Arc<dyn VisibilityGate>,
    policy: RetryPolicy,
    load_timeout: Duration,
    cache: Option<Arc<MemoryCache<Bytes>>>,
    logger: Option<Arc<Logger>>,
    stats: Arc<Mutex<LoaderStats>>,
    phase: watch::Sender<ImagePhase>,
) -> Result<Bytes, PharosError> {
    let started = Instant::now();

    if let Some(cache) = &cache {
        if let Ok(Some(bytes)) = cache.get(&src) {
            stats.lock().dedup_hits += 1;
            let _ = phase.send(ImagePhase::Full(bytes.clone()));
            return Ok(bytes);
        }
    }

    if !options.critical {
        gate.wait_until_visible().await;
    }
    let _ = phase.send(ImagePhase::Loading);

    let mut placeholder_shown = false;
    if let Some(lq_src) = &options.low_quality_src {
        match timeout(load_timeout, fetcher.fetch(lq_src)).await {
            Ok(Ok(bytes)) => {
                placeholder_shown = true;
                let _ = phase.send(ImagePhase::LowQuality(bytes));
            }
            Ok(Err(e)) => {
                tracing::debug!(src = %lq_src, error = %e, "placeholder fetch failed, skipping");
            }
            Err(_) => {
                tracing::debug!(src = %lq_src, "placeholder fetch timed out, skipping");
            }
        }
    }

    let mut attempt = 0u32;
    loop {
        attempt += 1;

        let outcome = match timeout(load_timeout, fetcher.fetch(&src)).await {
            Ok(result) => result,
            Err(elapsed) => Err(PharosError::from(elapsed)),
        };

        match outcome {
            Ok(bytes) => {
                if let Some(cache) = &cache {
                    let _ = cache.set(&src, bytes.clone());
                }
                let _ = phase.send(ImagePhase::Full(bytes.clone()));
                stats.lock().completed += 1;
                if let Some(logger) = &logger {
                    logger.log(
                        LogLevel::Info,
                        format!("image loaded: {src}"),
                        Some(LogEvent::Custom {
                            name: "image_loaded".to_string(),
                            data: serde_json::json!({
                                "src": src,
                                "attempts": attempt,
                                "duration_ms": started.elapsed().as_millis() as u64,
                                "placeholder": placeholder_shown,
                            }),
                        }),
                    );
                }
                return Ok(bytes);
            }
            Err(e) if attempt < policy.max_retries => {
                stats.lock().retries += 1;
                tracing::debug!(src = %src, attempt, error = %e, "image load retrying");
                tokio::time::sleep(policy.delay(attempt)).await;
            }
            Err(e) => {
                if !placeholder_shown {
                    let _ = phase.send(ImagePhase::Failed(e.message()));
                }
                stats.lock().failed += 1;
                if let Some(logger) = &logger {
                    logger.log(
                        LogLevel::Error,
                        format!("image load failed: {src}"),
                        Some(LogEvent::ResourceError {
                            url: src.clone(),
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
