use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageErrorKind {
    UncaughtException,
    UnhandledRejection,
    ResourceFailure,
}

impl PageErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PageErrorKind::UncaughtException => "uncaught_exception",
            PageErrorKind::UnhandledRejection => "unhandled_rejection",
            PageErrorKind::ResourceFailure => "resource_failure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageErrorEvent {
    pub kind: PageErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl PageErrorEvent {
    pub fn new(kind: PageErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), source: None, line: None, column: None }
    }

    pub fn at(mut self, source: impl Into<String>, line: u32, column: u32) -> Self {
        self.source = Some(source.into());
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

/// Fan-out of page-level error events from the host (uncaught exceptions,
/// unhandled rejections, failed resource loads).
pub trait ErrorEventSource: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<PageErrorEvent>;
}

pub struct ErrorEvents {
    sender: broadcast::Sender<PageErrorEvent>,
}

impl ErrorEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Dropped silently when no subscriber is listening.
    pub fn emit(&self, event: PageErrorEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for ErrorEvents {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ErrorEventSource for ErrorEvents {
    fn subscribe(&self) -> broadcast::Receiver<PageErrorEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_reaches_subscriber() {
        let events = ErrorEvents::default();
        let mut rx = events.subscribe();

        events.emit(
            PageErrorEvent::new(PageErrorKind::UncaughtException, "boom").at("app.js", 10, 4),
        );

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, PageErrorKind::UncaughtException);
        assert_eq!(received.message, "boom");
        assert_eq!(received.line, Some(10));
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let events = ErrorEvents::default();
        events.emit(PageErrorEvent::new(PageErrorKind::ResourceFailure, "404 /logo.png"));
    }
}
