use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifecycle of one lazy-load task.
///
/// `Idle -> Loading -> Loaded`, with `Loading -> Retrying -> Loading` while
/// the attempt budget lasts. `Error` is terminal until an explicit retry
/// clears the task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Retrying,
    Loaded,
    Error {
        message: String,
    },
}

impl LoadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadState::Loaded | LoadState::Error { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, LoadState::Error { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Linear,
    Exponential,
}

/// Attempt budget plus the delay curve between attempts. `max_retries` is the
/// total number of attempts a task may make before its error becomes
/// terminal.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn linear(max_retries: u32, base_delay: Duration) -> Self {
        Self { max_retries, base_delay, backoff: Backoff::Linear }
    }

    pub fn exponential(max_retries: u32, base_delay: Duration) -> Self {
        Self { max_retries, base_delay, backoff: Backoff::Exponential }
    }

    /// Delay after failed attempt number `attempt` (1-based): linear grows as
    /// `base * attempt`, exponential as `base * 2^attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Linear => self.base_delay.saturating_mul(attempt.max(1)),
            Backoff::Exponential => {
                let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
        }
    }
}

/// Counters shared by the module and image loaders.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoaderStats {
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
    pub retries: u64,
    pub dedup_hits: u64,
}
