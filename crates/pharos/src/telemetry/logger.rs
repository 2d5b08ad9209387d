use crate::bridge::{
    AnalyticsEvent, AnalyticsSink, ErrorEventSource, LocalStore, PageErrorEvent, PageErrorKind,
    PerformanceSource,
};
use crate::config::{Mode, TelemetryConfig};
use crate::telemetry::entry::{LogEntry, LogEvent, LogLevel, PerformanceSnapshot};
use crate::telemetry::rate_limit::LogRateLimiter;
use crate::telemetry::remote::{BatchMetadata, LogBatch, LogTransport};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub const LOGS_KEY: &str = "app_logs";

#[derive(Debug, Clone, Default, Serialize)]
pub struct TelemetryStats {
    pub logged: u64,
    pub rate_limited: u64,
    pub overflow_dropped: u64,
    pub persist_failures: u64,
    pub flushed: u64,
    pub flush_failures: u64,
    pub errors_captured: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub mode: Mode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogExport {
    pub session: SessionInfo,
    pub buffer: Vec<LogEntry>,
    pub saved: Vec<LogEntry>,
    pub performance: Option<PerformanceSnapshot>,
}

/// Rate-limited structured logger. Every accepted entry goes to the console
/// sink, the in-memory ring, and best-effort local persistence; error-level
/// entries are additionally forwarded to analytics. A separate pending queue
/// feeds the remote transport in batches.
///
/// Logging is synchronous and infallible from the caller's point of view;
/// only `flush` suspends.
pub struct Logger {
    session: SessionInfo,
    config: TelemetryConfig,
    console_enabled: bool,
    limiter: LogRateLimiter,
    buffer: Mutex<VecDeque<LogEntry>>,
    pending: Mutex<VecDeque<LogEntry>>,
    store: Option<Arc<dyn LocalStore>>,
    transport: Option<Arc<dyn LogTransport>>,
    analytics: Option<Arc<dyn AnalyticsSink>>,
    performance: Option<Arc<dyn PerformanceSource>>,
    stats: Mutex<TelemetryStats>,
}

pub struct LoggerBuilder {
    config: TelemetryConfig,
    mode: Mode,
    session_id: Option<Uuid>,
    console_enabled: bool,
    store: Option<Arc<dyn LocalStore>>,
    transport: Option<Arc<dyn LogTransport>>,
    analytics: Option<Arc<dyn AnalyticsSink>>,
    performance: Option<Arc<dyn PerformanceSource>>,
}

impl LoggerBuilder {
    pub fn new(config: TelemetryConfig, mode: Mode) -> Self {
        Self {
            config,
            mode,
            session_id: None,
            console_enabled: true,
            store: None,
            transport: None,
            analytics: None,
            performance: None,
        }
    }

    pub fn session_id(mut self, id: Uuid) -> Self {
        self.session_id = Some(id);
        self
    }

    pub fn console(mut self, enabled: bool) -> Self {
        self.console_enabled = enabled;
        self
    }

    pub fn store(mut self, store: Arc<dyn LocalStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn LogTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn analytics(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = Some(sink);
        self
    }

    pub fn performance(mut self, source: Arc<dyn PerformanceSource>) -> Self {
        self.performance = Some(source);
        self
    }

    pub fn build(self) -> Arc<Logger> {
        let limiter = LogRateLimiter::with_capacity(
            self.config.rate_limit_max,
            Duration::from_millis(self.config.rate_limit_window_ms),
            self.config.rate_limit_max_keys,
        );

        Arc::new(Logger {
            session: SessionInfo {
                id: self.session_id.unwrap_or_else(Uuid::new_v4),
                started_at: Utc::now(),
                mode: self.mode,
            },
            config: self.config,
            console_enabled: self.console_enabled,
            limiter,
            buffer: Mutex::new(VecDeque::new()),
            pending: Mutex::new(VecDeque::new()),
            store: self.store,
            transport: self.transport,
            analytics: self.analytics,
            performance: self.performance,
            stats: Mutex::new(TelemetryStats::default()),
        })
    }
}

impl Logger {
    pub fn builder(config: TelemetryConfig, mode: Mode) -> LoggerBuilder {
        LoggerBuilder::new(config, mode)
    }

    pub fn session(&self) -> &SessionInfo {
        &self.session
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>, event: Option<LogEvent>) {
        let message = message.into();

        if !self.limiter.check(level, &message) {
            self.stats.lock().rate_limited += 1;
            return;
        }

        let mut entry = LogEntry::new(level, message, self.session.id);
        entry.event = event;
        entry.snapshot = self.runtime_snapshot();

        if self.console_enabled {
            self.console_line(&entry);
        }

        if entry.level == LogLevel::Error {
            self.forward_error(&entry);
        }

        {
            let mut buffer = self.buffer.lock();
            buffer.push_back(entry.clone());
            while buffer.len() > self.config.buffer_capacity {
                buffer.pop_front();
                self.stats.lock().overflow_dropped += 1;
            }
        }

        if self.transport.is_some() {
            let mut pending = self.pending.lock();
            pending.push_back(entry);
            while pending.len() > self.config.buffer_capacity {
                pending.pop_front();
            }
        }

        self.persist_recent();
        self.stats.lock().logged += 1;
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message, None);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message, None);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message, None);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message, None);
    }

    pub fn user_action(&self, action: &str, target: Option<&str>) {
        self.log(
            LogLevel::Info,
            format!("user action: {action}"),
            Some(LogEvent::UserAction {
                action: action.to_string(),
                target: target.map(str::to_string),
            }),
        );
    }

    pub fn api_call(
        &self,
        endpoint: &str,
        method: &str,
        status: Option<u16>,
        duration_ms: Option<f64>,
    ) {
        self.log(
            LogLevel::Info,
            format!("api call: {method} {endpoint}"),
            Some(LogEvent::ApiCall {
                endpoint: endpoint.to_string(),
                method: method.to_string(),
                status,
                duration_ms,
            }),
        );
    }

    pub fn page_view(&self, path: &str, referrer: Option<&str>) {
        self.log(
            LogLevel::Info,
            format!("page view: {path}"),
            Some(LogEvent::PageView {
                path: path.to_string(),
                referrer: referrer.map(str::to_string),
            }),
        );
    }

    pub fn feature_usage(&self, feature: &str) {
        self.log(
            LogLevel::Info,
            format!("feature used: {feature}"),
            Some(LogEvent::FeatureUsage { feature: feature.to_string() }),
        );
    }

    /// Converts a host error event into an error-level entry. Also invoked by
    /// the background capture task.
    pub fn capture_page_error(&self, event: PageErrorEvent) {
        self.stats.lock().errors_captured += 1;

        let log_event = match event.kind {
            PageErrorKind::ResourceFailure => LogEvent::ResourceError {
                url: event.source.clone().unwrap_or_default(),
                message: event.message.clone(),
                attempts: None,
            },
            kind => LogEvent::RuntimeError {
                kind,
                source: event.source.clone(),
                line: event.line,
                column: event.column,
            },
        };

        self.log(LogLevel::Error, event.message, Some(log_event));
    }

    /// Drains the pending queue to the remote transport in batches. Failures
    /// are swallowed after a warning; remaining entries are dropped with the
    /// failed batch rather than retried.
    pub async fn flush(&self) {
        let Some(transport) = self.transport.clone() else {
            return;
        };

        loop {
            let logs: Vec<LogEntry> = {
                let mut pending = self.pending.lock();
                let take = pending.len().min(self.config.batch_size);
                pending.drain(..take).collect()
            };
            if logs.is_empty() {
                break;
            }

            let count = logs.len() as u64;
            let batch =
                LogBatch { session_id: self.session.id, logs, metadata: self.batch_metadata() };

            match transport.send(&batch).await {
                Ok(()) => {
                    self.stats.lock().flushed += count;
                }
                Err(e) => {
                    tracing::warn!(error = %e, dropped = count, "log flush failed");
                    let mut stats = self.stats.lock();
                    stats.flush_failures += 1;
                    break;
                }
            }
        }
    }

    pub fn start_flush_task(self: Arc<Self>) -> JoinHandle<()> {
        let logger = self;
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(logger.config.flush_interval_ms));
            loop {
                interval.tick().await;
                logger.flush().await;
            }
        })
    }

    pub fn start_error_capture(self: Arc<Self>, source: &dyn ErrorEventSource) -> JoinHandle<()> {
        let mut receiver = source.subscribe();
        let logger = self;
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => logger.capture_page_error(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "page error stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    pub fn start_cleanup_task(self: Arc<Self>) -> JoinHandle<()> {
        let window = Duration::from_millis(self.config.rate_limit_window_ms);
        Arc::new(self.limiter.clone()).start_cleanup_task(window)
    }

    pub fn export(&self) -> LogExport {
        LogExport {
            session: self.session.clone(),
            buffer: self.buffer.lock().iter().cloned().collect(),
            saved: self.saved_entries(),
            performance: self.runtime_snapshot(),
        }
    }

    pub fn saved_entries(&self) -> Vec<LogEntry> {
        let Some(store) = &self.store else {
            return Vec::new();
        };

        match store.get(LOGS_KEY) {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "saved log buffer is corrupt, ignoring");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read saved logs");
                Vec::new()
            }
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn pending_remote(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn stats(&self) -> TelemetryStats {
        self.stats.lock().clone()
    }

    fn runtime_snapshot(&self) -> Option<PerformanceSnapshot> {
        let source = self.performance.as_ref()?;
        let memory = source.memory();
        Some(PerformanceSnapshot {
            elapsed_ms: source.now_ms(),
            used_heap_bytes: memory.map(|m| m.used_heap_bytes),
            total_heap_bytes: memory.map(|m| m.total_heap_bytes),
        })
    }

    fn console_line(&self, entry: &LogEntry) {
        match entry.level {
            LogLevel::Debug => {
                tracing::debug!(session_id = %entry.session_id, "{}", entry.message);
            }
            LogLevel::Info => {
                tracing::info!(session_id = %entry.session_id, "{}", entry.message);
            }
            LogLevel::Warn => {
                tracing::warn!(session_id = %entry.session_id, "{}", entry.message);
            }
            LogLevel::Error => {
                tracing::error!(session_id = %entry.session_id, "{}", entry.message);
            }
        }
    }

    fn forward_error(&self, entry: &LogEntry) {
        let Some(sink) = &self.analytics else {
            return;
        };

        let mut event = AnalyticsEvent::new("error_log")
            .with_property("message", entry.message.clone())
            .with_property("session_id", entry.session_id.to_string());
        if let Some(LogEvent::RuntimeError { kind, .. }) = &entry.event {
            event = event.with_property("kind", kind.as_str());
        }

        sink.track(event);
    }

    fn persist_recent(&self) {
        let Some(store) = &self.store else {
            return;
        };

        let recent: Vec<LogEntry> = {
            let buffer = self.buffer.lock();
            let skip = buffer.len().saturating_sub(self.config.persist_capacity);
            buffer.iter().skip(skip).cloned().collect()
        };

        let json = match serde_json::to_string(&recent) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize log buffer");
                self.stats.lock().persist_failures += 1;
                return;
            }
        };

        if let Err(e) = store.set(LOGS_KEY, &json) {
            tracing::warn!(error = %e, "failed to persist log buffer");
            self.stats.lock().persist_failures += 1;
        }
    }

    fn batch_metadata(&self) -> BatchMetadata {
        let rate_limited = self.stats.lock().rate_limited;
        let buffered = self.buffer.lock().len();
        BatchMetadata { mode: self.session.mode, buffered, rate_limited }
    }
}
