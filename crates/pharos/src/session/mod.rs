use crate::bridge::{
    AlwaysVisible, AnalyticsSink, DomSource, ErrorEventSource, HttpFetcher, LocalStore,
    MemoryStore, PerformanceSource, ResourceFetcher, VisibilityGate,
};
use crate::cache::MemoryCache;
use crate::config::{Config, Feature, FeatureFlags};
use crate::error::PharosError;
use crate::loader::{
    HintSink, ImageLoadOptions, ImageLoader, ImageTask, LoadHandle, ModuleLoader, Preloader,
};
use crate::score::{LighthouseExport, LighthouseScores, ScoreEstimator};
use crate::telemetry::{HttpTransport, LogEvent, LogExport, LogLevel, LogTransport, Logger};
use crate::vitals::{MetricSample, VitalsCollector};
use bytes::Bytes;
use futures_util::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Where the instrumented page is running. Carried into exports and
/// persisted vitals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContext {
    pub url: String,
    pub user_agent: String,
}

/// Composition root. Wires the logger, collector, estimator, and loaders
/// against the host bridges according to the feature flags, owns their
/// background tasks, and tears everything down on `shutdown`.
///
/// Components behind a disabled flag are simply not constructed; nothing
/// downstream checks flags at call time.
pub struct Pharos {
    config: Config,
    context: PageContext,
    flags: FeatureFlags,
    logger: Arc<Logger>,
    fetcher: Arc<dyn ResourceFetcher>,
    collector: Option<Arc<VitalsCollector>>,
    estimator: Option<ScoreEstimator>,
    modules: Option<Arc<ModuleLoader<Bytes>>>,
    images: Option<Arc<ImageLoader>>,
    image_cache: Option<Arc<MemoryCache<Bytes>>>,
    preloader: Arc<Preloader>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

pub struct PharosBuilder {
    config: Config,
    flags: FeatureFlags,
    context: PageContext,
    performance: Option<Arc<dyn PerformanceSource>>,
    dom: Option<Arc<dyn DomSource>>,
    errors: Option<Arc<dyn ErrorEventSource>>,
    store: Option<Arc<dyn LocalStore>>,
    analytics: Option<Arc<dyn AnalyticsSink>>,
    transport: Option<Arc<dyn LogTransport>>,
    fetcher: Option<Arc<dyn ResourceFetcher>>,
    visibility: Option<Arc<dyn VisibilityGate>>,
    hint_sink: Option<Arc<dyn HintSink>>,
}

impl PharosBuilder {
    pub fn new(config: Config) -> Self {
        let flags = FeatureFlags::defaults(config.mode);
        Self {
            config,
            flags,
            context: PageContext::default(),
            performance: None,
            dom: None,
            errors: None,
            store: None,
            analytics: None,
            transport: None,
            fetcher: None,
            visibility: None,
            hint_sink: None,
        }
    }

    /// Config and flags from `PHAROS_*` environment variables.
    pub fn from_env() -> Result<Self, PharosError> {
        let config = Config::from_env()
            .map_err(|e| PharosError::validation(format!("invalid environment config: {e}")))?;
        let flags = FeatureFlags::from_env(config.mode);
        Ok(Self { flags, ..Self::new(config) })
    }

    pub fn flags(mut self, flags: FeatureFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn context(mut self, context: PageContext) -> Self {
        self.context = context;
        self
    }

    pub fn performance(mut self, source: Arc<dyn PerformanceSource>) -> Self {
        self.performance = Some(source);
        self
    }

    pub fn dom(mut self, source: Arc<dyn DomSource>) -> Self {
        self.dom = Some(source);
        self
    }

    pub fn errors(mut self, source: Arc<dyn ErrorEventSource>) -> Self {
        self.errors = Some(source);
        self
    }

    pub fn store(mut self, store: Arc<dyn LocalStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn analytics(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = Some(sink);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn LogTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn visibility(mut self, gate: Arc<dyn VisibilityGate>) -> Self {
        self.visibility = Some(gate);
        self
    }

    pub fn hint_sink(mut self, sink: Arc<dyn HintSink>) -> Self {
        self.hint_sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<Pharos, PharosError> {
        let Self {
            config,
            flags,
            context,
            performance,
            dom,
            errors,
            store,
            analytics,
            transport,
            fetcher,
            visibility,
            hint_sink,
        } = self;

        let store: Option<Arc<dyn LocalStore>> = if flags.is_enabled(Feature::LocalStorage) {
            Some(store.unwrap_or_else(|| Arc::new(MemoryStore::new())))
        } else {
            None
        };
        let analytics = if flags.is_enabled(Feature::Analytics) { analytics } else { None };
        let fetcher = fetcher.unwrap_or_else(|| Arc::new(HttpFetcher::new()));
        let visibility = visibility.unwrap_or_else(|| Arc::new(AlwaysVisible));

        let transport: Option<Arc<dyn LogTransport>> = match transport {
            Some(transport) => Some(transport),
            None => match (&config.telemetry.endpoint, config.is_production()) {
                (Some(endpoint), true) => Some(Arc::new(HttpTransport::new(endpoint)?)),
                _ => None,
            },
        };

        let mut logger_builder = Logger::builder(config.telemetry.clone(), config.mode)
            .console(flags.is_enabled(Feature::ConsoleLogging));
        if let Some(store) = &store {
            logger_builder = logger_builder.store(Arc::clone(store));
        }
        if let Some(sink) = &analytics {
            logger_builder = logger_builder.analytics(Arc::clone(sink));
        }
        if flags.is_enabled(Feature::MemoryMonitoring) {
            if let Some(source) = &performance {
                logger_builder = logger_builder.performance(Arc::clone(source));
            }
        }
        let has_transport = transport.is_some();
        if let Some(transport) = transport {
            logger_builder = logger_builder.transport(transport);
        }
        let logger = logger_builder.build();

        let mut tasks = Vec::new();
        if has_transport {
            tasks.push(Arc::clone(&logger).start_flush_task());
        }
        tasks.push(Arc::clone(&logger).start_cleanup_task());

        if flags.is_enabled(Feature::ErrorReporting) {
            if let Some(source) = &errors {
                tasks.push(Arc::clone(&logger).start_error_capture(source.as_ref()));
            }
        }

        let collector = if flags.is_enabled(Feature::WebVitals) {
            performance.as_ref().map(|source| {
                let mut collector =
                    VitalsCollector::new(Arc::clone(source), config.vitals.clone())
                        .with_page_url(context.url.clone());
                if let Some(store) = &store {
                    collector = collector.with_store(Arc::clone(store));
                }
                if flags.is_enabled(Feature::PerformanceTracking) {
                    if let Some(sink) = &analytics {
                        collector = collector.with_analytics(Arc::clone(sink));
                    }
                }
                let collector = Arc::new(collector);
                collector.connect();
                tasks.push(Arc::clone(&collector).start_polling());
                collector
            })
        } else {
            None
        };

        let estimator = if flags.is_enabled(Feature::LighthouseMonitor) {
            let mut estimator = ScoreEstimator::new();
            if let Some(dom) = dom {
                estimator = estimator.with_dom(dom);
            }
            Some(estimator)
        } else {
            None
        };

        let (modules, images, image_cache) = if flags.is_enabled(Feature::LazyLoading) {
            let image_cache = Arc::new(MemoryCache::new(config.cache.max_entries));
            let modules = Arc::new(
                ModuleLoader::new(&config.loader).with_logger(Arc::clone(&logger)),
            );
            let images = Arc::new(
                ImageLoader::new(Arc::clone(&fetcher), visibility, &config.loader)
                    .with_cache(Arc::clone(&image_cache))
                    .with_logger(Arc::clone(&logger)),
            );
            (Some(modules), Some(images), Some(image_cache))
        } else {
            (None, None, None)
        };

        let mut preloader = Preloader::new();
        if flags.is_enabled(Feature::ResourceHints) {
            if let Some(sink) = hint_sink {
                preloader = preloader.with_sink(sink);
            }
        }

        logger.log(
            LogLevel::Info,
            "instrumentation session started",
            Some(LogEvent::Custom {
                name: "session_start".to_string(),
                data: serde_json::json!({
                    "url": context.url,
                    "mode": config.mode.to_string(),
                }),
            }),
        );

        Ok(Pharos {
            config,
            context,
            flags,
            logger,
            fetcher,
            collector,
            estimator,
            modules,
            images,
            image_cache,
            preloader: Arc::new(preloader),
            tasks: Mutex::new(tasks),
        })
    }
}

impl Pharos {
    pub fn builder(config: Config) -> PharosBuilder {
        PharosBuilder::new(config)
    }

    pub fn session_id(&self) -> Uuid {
        self.logger.session().id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn context(&self) -> &PageContext {
        &self.context
    }

    pub fn flags(&self) -> &FeatureFlags {
        &self.flags
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }

    pub fn collector(&self) -> Option<&Arc<VitalsCollector>> {
        self.collector.as_ref()
    }

    pub fn modules(&self) -> Option<&Arc<ModuleLoader<Bytes>>> {
        self.modules.as_ref()
    }

    pub fn images(&self) -> Option<&Arc<ImageLoader>> {
        self.images.as_ref()
    }

    pub fn image_cache(&self) -> Option<&Arc<MemoryCache<Bytes>>> {
        self.image_cache.as_ref()
    }

    pub fn preloader(&self) -> &Arc<Preloader> {
        &self.preloader
    }

    /// Collected samples so far; empty without a collector.
    pub fn metrics(&self) -> Vec<MetricSample> {
        self.collector.as_ref().map(|c| c.metrics()).unwrap_or_default()
    }

    /// Category scores on demand; `None` when the monitor flag is off.
    pub fn scores(&self) -> Option<LighthouseScores> {
        self.estimator.as_ref().map(|e| e.scores(&self.metrics()))
    }

    pub fn export_lighthouse_data(&self) -> Option<LighthouseExport> {
        let scores = self.scores()?;
        Some(LighthouseExport::new(
            self.context.url.clone(),
            self.context.user_agent.clone(),
            self.metrics(),
            scores,
        ))
    }

    pub fn export_logs(&self) -> LogExport {
        self.logger.export()
    }

    /// Fetches a keyed module through the single-flight loader. `None` when
    /// lazy loading is disabled.
    pub fn load_module(&self, key: &str, url: &str) -> Option<LoadHandle<Bytes>> {
        let loader = self.modules.as_ref()?;
        let fetcher = Arc::clone(&self.fetcher);
        let url = url.to_string();
        Some(loader.load(key, move || {
            let fetcher = Arc::clone(&fetcher);
            let url = url.clone();
            async move { fetcher.fetch(&url).await }.boxed()
        }))
    }

    pub fn load_image(&self, src: &str, options: ImageLoadOptions) -> Option<ImageTask> {
        self.images.as_ref().map(|loader| loader.load(src, options))
    }

    /// Stops background work and drains one final flush. Safe to call once;
    /// the session is unusable for new background work afterwards.
    pub async fn shutdown(&self) {
        if let Some(collector) = &self.collector {
            collector.poll();
            collector.disconnect();
        }
        self.preloader.abort_all();

        for task in self.tasks.lock().drain(..) {
            task.abort();
        }

        self.logger.flush().await;
        tracing::debug!(session_id = %self.session_id(), "instrumentation session stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{
        ErrorEvents, FirstInputEntry, LayoutShiftEntry, LongTaskEntry, MemoryAnalytics,
        NavigationTiming, PageErrorEvent, PageErrorKind, PaintTiming, StaticDom, StaticPerformance,
    };
    use crate::config::Mode;
    use crate::telemetry::MemoryTransport;
    use crate::vitals::Rating;
    use std::time::Duration;

    fn good_page_source() -> Arc<StaticPerformance> {
        let source = Arc::new(StaticPerformance::new());
        source.set_navigation_timing(NavigationTiming {
            request_start: 10.0,
            response_start: 110.0,
            dom_interactive: 2_000.0,
            dom_complete: 2_000.0,
            load_event_end: 2_200.0,
        });
        source.set_paint_timing(PaintTiming {
            first_paint: Some(800.0),
            first_contentful_paint: Some(900.0),
        });
        source.push_lcp(1_200.0);
        source.push_layout_shift(LayoutShiftEntry {
            start_time: 300.0,
            value: 0.02,
            had_recent_input: false,
        });
        source.set_first_input(FirstInputEntry { start_time: 100.0, processing_start: 140.0 });
        source.push_long_task(LongTaskEntry { start_time: 1_000.0, duration: 90.0 });
        source
    }

    fn clean_dom() -> Arc<StaticDom> {
        Arc::new(StaticDom::with_summary(crate::bridge::DomSummary {
            url: "https://app.example/".to_string(),
            title: Some("App".to_string()),
            meta_description: Some("An instrumented app".to_string()),
            has_viewport_meta: true,
            has_doctype: true,
            https: true,
            node_count: 600,
            console_error_count: 0,
            images: vec![],
            links: vec![],
            controls: vec![],
        }))
    }

    #[tokio::test]
    async fn test_good_page_scores_green_end_to_end() {
        let pharos = Pharos::builder(Config::default())
            .context(PageContext {
                url: "https://app.example/".to_string(),
                user_agent: "Mozilla/5.0 (test)".to_string(),
            })
            .performance(good_page_source())
            .dom(clean_dom())
            .build()
            .unwrap();

        pharos.collector().unwrap().poll();

        let metrics = pharos.metrics();
        assert_eq!(metrics.len(), 8);
        for sample in &metrics {
            assert_eq!(sample.rating, Rating::Good, "{} should rate good", sample.name);
        }

        let scores = pharos.scores().unwrap();
        let performance = scores.performance.unwrap();
        assert!((90..=100).contains(&performance), "got {performance}");
        assert_eq!(scores.accessibility, Some(95));
        assert_eq!(scores.best_practices, Some(95));
        assert_eq!(scores.seo, Some(90));

        let export = pharos.export_lighthouse_data().unwrap();
        assert_eq!(export.url, "https://app.example/");
        assert_eq!(export.user_agent, "Mozilla/5.0 (test)");
        assert_eq!(export.metrics.len(), 8);

        pharos.shutdown().await;
    }

    #[tokio::test]
    async fn test_development_defaults_keep_analytics_dark() {
        let sink = Arc::new(MemoryAnalytics::new());
        let pharos = Pharos::builder(Config::default())
            .performance(good_page_source())
            .analytics(sink.clone())
            .build()
            .unwrap();

        assert!(pharos.config().is_development());
        pharos.logger().error("something broke");
        pharos.collector().unwrap().poll();

        // Analytics defaults off outside production, so nothing reaches the
        // sink even though one was provided.
        assert!(sink.events().is_empty());
        pharos.shutdown().await;
    }

    #[tokio::test]
    async fn test_production_forwards_vitals_and_errors_to_analytics() {
        let sink = Arc::new(MemoryAnalytics::new());
        let pharos = Pharos::builder(Config::new(Mode::Production))
            .performance(good_page_source())
            .analytics(sink.clone())
            .build()
            .unwrap();

        pharos.logger().error("render crashed");
        pharos.collector().unwrap().poll();

        let events = sink.events();
        assert!(events.iter().any(|e| e.name == "error_log"));
        assert!(events.iter().any(|e| e.name == "web_vital"));
        pharos.shutdown().await;
    }

    #[tokio::test]
    async fn test_disabled_lazy_loading_leaves_loaders_unwired() {
        let mut flags = FeatureFlags::defaults(Mode::Development);
        flags.set(Feature::LazyLoading, false);

        let pharos = Pharos::builder(Config::default()).flags(flags).build().unwrap();
        assert!(pharos.modules().is_none());
        assert!(pharos.images().is_none());
        assert!(pharos.load_module("chart", "https://cdn.example/chart.js").is_none());
        pharos.shutdown().await;
    }

    #[tokio::test]
    async fn test_disabled_web_vitals_skips_the_collector() {
        let mut flags = FeatureFlags::defaults(Mode::Development);
        flags.set(Feature::WebVitals, false);

        let pharos = Pharos::builder(Config::default())
            .flags(flags)
            .performance(good_page_source())
            .build()
            .unwrap();
        assert!(pharos.collector().is_none());
        assert!(pharos.metrics().is_empty());
        pharos.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_drains_a_final_flush() {
        let transport = Arc::new(MemoryTransport::new());
        let pharos = Pharos::builder(Config::new(Mode::Production))
            .transport(transport.clone())
            .build()
            .unwrap();

        pharos.logger().info("one");
        pharos.logger().info("two");
        pharos.shutdown().await;

        // session_start plus the two entries above.
        assert_eq!(transport.sent_entries(), 3);
    }

    #[tokio::test]
    async fn test_page_errors_flow_into_the_log_buffer() {
        let events = Arc::new(ErrorEvents::default());
        let pharos = Pharos::builder(Config::default())
            .errors(events.clone())
            .build()
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        events.emit(
            PageErrorEvent::new(PageErrorKind::UnhandledRejection, "fetch rejected")
                .at("app.js", 44, 2),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;

        let export = pharos.export_logs();
        assert!(export
            .buffer
            .iter()
            .any(|entry| entry.message == "fetch rejected" && entry.level == LogLevel::Error));

        pharos.shutdown().await;
    }

    #[tokio::test]
    async fn test_module_loads_flow_through_the_session_fetcher() {
        use crate::bridge::ResourceFetcher;
        use async_trait::async_trait;
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct StubFetcher {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl ResourceFetcher for StubFetcher {
            async fn fetch(&self, url: &str) -> Result<Bytes, PharosError> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(Bytes::from(format!("bundle:{url}")))
            }
        }

        let fetcher = Arc::new(StubFetcher { calls: AtomicUsize::new(0) });
        let pharos = Pharos::builder(Config::default())
            .fetcher(fetcher.clone())
            .build()
            .unwrap();

        let handle = pharos.load_module("chart", "https://cdn.example/chart.js").unwrap();
        let bytes = handle.wait().await.unwrap();
        assert_eq!(bytes, Bytes::from_static(b"bundle:https://cdn.example/chart.js"));

        // Same key is shared, not refetched.
        let again = pharos.load_module("chart", "https://cdn.example/chart.js").unwrap();
        again.wait().await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        pharos.shutdown().await;
    }
}
