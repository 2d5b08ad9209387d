use crate::bridge::{AnalyticsEvent, AnalyticsSink, LocalStore, PerformanceSource};
use crate::config::VitalsConfig;
use crate::vitals::cls::ClsTracker;
use crate::vitals::metric::{MetricName, MetricSample, Rating};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const VITALS_KEY: &str = "webVitals";

const BLOCKING_THRESHOLD_MS: f64 = 50.0;
const TBT_FALLBACK_RATIO: f64 = 0.30;

#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectorStats {
    pub polls: u64,
    pub recorded: u64,
    pub persist_failures: u64,
}

/// Local-store value layout under [`VITALS_KEY`], keyed by metric name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedVital {
    pub value: f64,
    pub rating: Rating,
    pub timestamp: DateTime<Utc>,
    pub url: String,
}

#[derive(Default)]
struct CollectorState {
    metrics: FxHashMap<MetricName, MetricSample>,
    cls: ClsTracker,
    shifts_seen: usize,
    lcp_finalized: bool,
    cls_finalized: bool,
    dirty: bool,
    stats: CollectorStats,
}

/// Pull-style web-vitals collector. Each `poll` takes a fresh snapshot from
/// the performance source and folds it into a per-name last-write-wins map.
/// Polling is idempotent; consumers read through `metrics`/`metric`.
///
/// LCP and CLS observation self-bounds: both finalize on the first poll that
/// sees the page hidden or the clock past the settle window, after which new
/// entries for them are ignored.
pub struct VitalsCollector {
    source: Arc<dyn PerformanceSource>,
    store: Option<Arc<dyn LocalStore>>,
    analytics: Option<Arc<dyn AnalyticsSink>>,
    page_url: String,
    config: VitalsConfig,
    state: Mutex<CollectorState>,
}

impl VitalsCollector {
    pub fn new(source: Arc<dyn PerformanceSource>, config: VitalsConfig) -> Self {
        Self {
            source,
            store: None,
            analytics: None,
            page_url: String::new(),
            config,
            state: Mutex::new(CollectorState::default()),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn LocalStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_analytics(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = Some(sink);
        self
    }

    pub fn with_page_url(mut self, url: impl Into<String>) -> Self {
        self.page_url = url.into();
        self
    }

    pub fn connect(&self) {
        self.source.connect();
    }

    pub fn disconnect(&self) {
        self.source.disconnect();
    }

    /// One collection pass over the source snapshot.
    pub fn poll(&self) {
        let hidden = self.source.is_hidden();
        let now = self.source.now_ms();
        let settled = now > self.config.settle_window_ms as f64;
        let nav = self.source.navigation_timing();
        let fcp = self.source.paint_timing().and_then(|p| p.first_contentful_paint);

        let mut state = self.state.lock();
        state.stats.polls += 1;

        if let Some(nav) = &nav {
            if nav.response_start > 0.0 {
                self.record(&mut state, MetricName::Ttfb, nav.response_start - nav.request_start);
            }
            if nav.dom_interactive > 0.0 {
                self.record(&mut state, MetricName::Tti, nav.dom_interactive);
            }
        }

        if let Some(fcp) = fcp {
            self.record(&mut state, MetricName::Fcp, fcp);
        }

        if let (Some(fcp), Some(nav)) = (fcp, &nav) {
            if nav.dom_complete > 0.0 && nav.load_event_end > 0.0 {
                let si = 0.25 * fcp + 0.5 * nav.dom_complete + 0.25 * nav.load_event_end;
                self.record(&mut state, MetricName::Si, si);
            }
        }

        if !state.lcp_finalized {
            let best = self
                .source
                .lcp_entries()
                .iter()
                .map(|e| e.start_time)
                .fold(f64::NEG_INFINITY, f64::max);
            if best.is_finite() {
                self.record(&mut state, MetricName::Lcp, best);
            }
            if hidden || settled {
                state.lcp_finalized = true;
            }
        }

        if !state.cls_finalized {
            let shifts = self.source.layout_shifts();
            for entry in shifts.iter().skip(state.shifts_seen) {
                state.cls.add(entry);
            }
            state.shifts_seen = shifts.len();
            if state.shifts_seen > 0 || hidden {
                let value = state.cls.value();
                self.record(&mut state, MetricName::Cls, value);
            }
            if hidden || settled {
                state.cls_finalized = true;
            }
        }

        if !state.metrics.contains_key(&MetricName::Fid) {
            if let Some(input) = self.source.first_input() {
                self.record(&mut state, MetricName::Fid, input.processing_start - input.start_time);
            }
        }

        match self.source.long_tasks() {
            Some(tasks) => {
                if let Some(fcp) = fcp {
                    let tbt: f64 = tasks
                        .iter()
                        .filter(|t| t.start_time >= fcp)
                        .map(|t| (t.duration - BLOCKING_THRESHOLD_MS).max(0.0))
                        .sum();
                    self.record(&mut state, MetricName::Tbt, tbt);
                }
            }
            None => {
                if let (Some(fcp), Some(nav)) = (fcp, &nav) {
                    if nav.dom_interactive > fcp {
                        let estimate = TBT_FALLBACK_RATIO * (nav.dom_interactive - fcp);
                        self.record(&mut state, MetricName::Tbt, estimate);
                    }
                }
            }
        }

        let snapshot = if state.dirty && self.store.is_some() {
            state.dirty = false;
            Some(self.persisted_snapshot(&state))
        } else {
            None
        };
        drop(state);

        if let Some(snapshot) = snapshot {
            self.persist(&snapshot);
        }
    }

    pub fn start_polling(self: Arc<Self>) -> JoinHandle<()> {
        let collector = self;
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(collector.config.poll_interval_ms));
            loop {
                interval.tick().await;
                collector.poll();
            }
        })
    }

    /// Samples in declaration order of [`MetricName::ALL`].
    pub fn metrics(&self) -> Vec<MetricSample> {
        let state = self.state.lock();
        MetricName::ALL.iter().filter_map(|name| state.metrics.get(name).cloned()).collect()
    }

    pub fn metric(&self, name: MetricName) -> Option<MetricSample> {
        self.state.lock().metrics.get(&name).cloned()
    }

    pub fn stats(&self) -> CollectorStats {
        self.state.lock().stats.clone()
    }

    fn record(&self, state: &mut CollectorState, name: MetricName, value: f64) {
        let unchanged =
            state.metrics.get(&name).is_some_and(|s| (s.value - value).abs() < f64::EPSILON);
        if unchanged {
            return;
        }

        let sample = MetricSample::new(name, value);
        if let Some(sink) = &self.analytics {
            sink.track(
                AnalyticsEvent::new("web_vital")
                    .with_property("metric", name.as_str())
                    .with_property("value", value)
                    .with_property("rating", sample.rating.as_str()),
            );
        }
        state.metrics.insert(name, sample);
        state.stats.recorded += 1;
        state.dirty = true;
    }

    fn persisted_snapshot(&self, state: &CollectorState) -> BTreeMap<&'static str, PersistedVital> {
        state
            .metrics
            .iter()
            .map(|(name, sample)| {
                (
                    name.as_str(),
                    PersistedVital {
                        value: sample.value,
                        rating: sample.rating,
                        timestamp: sample.timestamp,
                        url: self.page_url.clone(),
                    },
                )
            })
            .collect()
    }

    fn persist(&self, snapshot: &BTreeMap<&'static str, PersistedVital>) {
        let Some(store) = &self.store else {
            return;
        };

        let json = match serde_json::to_string(snapshot) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize web vitals");
                self.state.lock().stats.persist_failures += 1;
                return;
            }
        };

        if let Err(e) = store.set(VITALS_KEY, &json) {
            tracing::warn!(error = %e, "failed to persist web vitals");
            self.state.lock().stats.persist_failures += 1;
        }
    }
}
