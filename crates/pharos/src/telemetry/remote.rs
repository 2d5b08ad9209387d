use crate::config::Mode;
use crate::error::PharosError;
use crate::telemetry::entry::LogEntry;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchMetadata {
    pub mode: Mode,
    pub buffered: usize,
    pub rate_limited: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogBatch {
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
    pub logs: Vec<LogEntry>,
    pub metadata: BatchMetadata,
}

/// Best-effort delivery of a log batch. Callers swallow errors; a failed
/// send must not take the page down with it.
#[async_trait]
pub trait LogTransport: Send + Sync {
    async fn send(&self, batch: &LogBatch) -> Result<(), PharosError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: url::Url,
}

impl HttpTransport {
    pub fn new(endpoint: &str) -> Result<Self, PharosError> {
        let endpoint = url::Url::parse(endpoint)
            .map_err(|e| PharosError::validation(format!("invalid log endpoint {endpoint}: {e}")))?;
        Ok(Self { client: reqwest::Client::new(), endpoint })
    }
}

#[async_trait]
impl LogTransport for HttpTransport {
    async fn send(&self, batch: &LogBatch) -> Result<(), PharosError> {
        let response = self.client.post(self.endpoint.clone()).json(batch).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PharosError::network(format!("log endpoint returned {status}"))
                .with_property("status", status.as_str()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTransport {
    batches: Mutex<Vec<LogBatch>>,
    failing: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn batches(&self) -> Vec<LogBatch> {
        self.batches.lock().clone()
    }

    pub fn sent_entries(&self) -> usize {
        self.batches.lock().iter().map(|batch| batch.logs.len()).sum()
    }
}

#[async_trait]
impl LogTransport for MemoryTransport {
    async fn send(&self, batch: &LogBatch) -> Result<(), PharosError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PharosError::network("transport unavailable"));
        }
        self.batches.lock().push(batch.clone());
        Ok(())
    }
}
