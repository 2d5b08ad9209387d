use crate::bridge::PageErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One strongly-typed variant per log category; collapses into the `LogEntry`
/// envelope at the sink boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    UserAction {
        action: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    ApiCall {
        endpoint: String,
        method: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_ms: Option<f64>,
    },
    PageView {
        path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        referrer: Option<String>,
    },
    FeatureUsage {
        feature: String,
    },
    RuntimeError {
        kind: PageErrorKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        line: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        column: Option<u32>,
    },
    ResourceError {
        url: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        attempts: Option<u32>,
    },
    Custom {
        name: String,
        data: serde_json::Value,
    },
}

/// Runtime state sampled at the moment an entry is created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PerformanceSnapshot {
    pub elapsed_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_heap_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_heap_bytes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub session_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<LogEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<PerformanceSnapshot>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>, session_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            level,
            message: message.into(),
            session_id,
            event: None,
            snapshot: None,
        }
    }

    pub fn with_event(mut self, event: LogEvent) -> Self {
        self.event = Some(event);
        self
    }

    pub fn with_snapshot(mut self, snapshot: PerformanceSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }
}
