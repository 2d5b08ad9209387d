pub mod entry;
pub mod logger;
pub mod rate_limit;
pub mod remote;

pub use entry::{LogEntry, LogEvent, LogLevel, PerformanceSnapshot};
pub use logger::{LogExport, Logger, LoggerBuilder, SessionInfo, TelemetryStats, LOGS_KEY};
pub use rate_limit::LogRateLimiter;
pub use remote::{BatchMetadata, HttpTransport, LogBatch, LogTransport, MemoryTransport};
