use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorMetadata {
    pub code: String,
    pub details: Option<FxHashMap<String, String>>,
    pub source: Option<String>,
    #[serde(skip)]
    pub error_source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Clone for ErrorMetadata {
    fn clone(&self) -> Self {
        Self {
            code: self.code.clone(),
            details: self.details.clone(),
            source: self.source.clone(),
            error_source: None,
        }
    }
}

impl PartialEq for ErrorMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code && self.details == other.details && self.source == other.source
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PharosError {
    NotFound(String, Option<ErrorMetadata>),
    Validation(String, Option<ErrorMetadata>),
    Internal(String, Option<ErrorMetadata>),
    Serialization(String, Option<ErrorMetadata>),
    Deserialization(String, Option<ErrorMetadata>),
    State(String, Option<ErrorMetadata>),
    Network(String, Option<ErrorMetadata>),
    Timeout(String, Option<ErrorMetadata>),
    LoadFailed(String, Option<ErrorMetadata>),
    Storage(String, Option<ErrorMetadata>),
    IoError(String, Option<ErrorMetadata>),
}

impl std::fmt::Display for PharosError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(msg, _) => write!(f, "Not found: {msg}"),
            Self::Validation(msg, _) => write!(f, "Validation error: {msg}"),
            Self::Internal(msg, _) => write!(f, "{msg}"),
            Self::Serialization(msg, _) => write!(f, "Serialization error: {msg}"),
            Self::Deserialization(msg, _) => write!(f, "Deserialization error: {msg}"),
            Self::State(msg, _) => write!(f, "State error: {msg}"),
            Self::Network(msg, _) => write!(f, "Network error: {msg}"),
            Self::Timeout(msg, _) => write!(f, "Timeout error: {msg}"),
            Self::LoadFailed(msg, _) => write!(f, "Load failed: {msg}"),
            Self::Storage(msg, _) => write!(f, "Storage error: {msg}"),
            Self::IoError(msg, _) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for PharosError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.metadata()
            .and_then(|meta| meta.error_source.as_ref())
            .map(|source| source.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl PharosError {
    pub fn message(&self) -> String {
        match self {
            Self::NotFound(msg, _) => msg.clone(),
            Self::Validation(msg, _) => msg.clone(),
            Self::Internal(msg, _) => msg.clone(),
            Self::Serialization(msg, _) => msg.clone(),
            Self::Deserialization(msg, _) => msg.clone(),
            Self::State(msg, _) => msg.clone(),
            Self::Network(msg, _) => msg.clone(),
            Self::Timeout(msg, _) => msg.clone(),
            Self::LoadFailed(msg, _) => msg.clone(),
            Self::Storage(msg, _) => msg.clone(),
            Self::IoError(msg, _) => msg.clone(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_, _) => "NOT_FOUND",
            Self::Validation(_, _) => "VALIDATION",
            Self::Internal(_, _) => "INTERNAL",
            Self::Serialization(_, _) => "SERIALIZATION_ERROR",
            Self::Deserialization(_, _) => "DESERIALIZATION_ERROR",
            Self::State(_, _) => "STATE_ERROR",
            Self::Network(_, _) => "NETWORK",
            Self::Timeout(_, _) => "TIMEOUT_ERROR",
            Self::LoadFailed(_, _) => "LOAD_FAILED",
            Self::Storage(_, _) => "STORAGE_ERROR",
            Self::IoError(_, _) => "IO_ERROR",
        }
    }

    fn metadata(&self) -> Option<&ErrorMetadata> {
        match self {
            Self::NotFound(_, meta) => meta.as_ref(),
            Self::Validation(_, meta) => meta.as_ref(),
            Self::Internal(_, meta) => meta.as_ref(),
            Self::Serialization(_, meta) => meta.as_ref(),
            Self::Deserialization(_, meta) => meta.as_ref(),
            Self::State(_, meta) => meta.as_ref(),
            Self::Network(_, meta) => meta.as_ref(),
            Self::Timeout(_, meta) => meta.as_ref(),
            Self::LoadFailed(_, meta) => meta.as_ref(),
            Self::Storage(_, meta) => meta.as_ref(),
            Self::IoError(_, meta) => meta.as_ref(),
        }
    }

    fn metadata_mut(&mut self) -> &mut Option<ErrorMetadata> {
        match self {
            Self::NotFound(_, meta) => meta,
            Self::Validation(_, meta) => meta,
            Self::Internal(_, meta) => meta,
            Self::Serialization(_, meta) => meta,
            Self::Deserialization(_, meta) => meta,
            Self::State(_, meta) => meta,
            Self::Network(_, meta) => meta,
            Self::Timeout(_, meta) => meta,
            Self::LoadFailed(_, meta) => meta,
            Self::Storage(_, meta) => meta,
            Self::IoError(_, meta) => meta,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into(), None)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into(), None)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into(), None)
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into(), None)
    }

    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into(), None)
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::State(message.into(), None)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into(), None)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into(), None)
    }

    pub fn load_failed(message: impl Into<String>) -> Self {
        Self::LoadFailed(message.into(), None)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into(), None)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::IoError(message.into(), None)
    }

    pub fn with_source(mut self, source: Box<dyn std::error::Error + Send + Sync>) -> Self {
        let code = self.code().to_string();
        let metadata = self.metadata_mut();
        let mut new_meta = metadata.clone().unwrap_or_else(|| ErrorMetadata {
            code,
            details: Some(FxHashMap::default()),
            source: None,
            error_source: None,
        });
        new_meta.source = Some(source.to_string());
        new_meta.error_source = Some(source);
        *metadata = Some(new_meta);
        self
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.set_property(key, value);
        self
    }

    pub fn set_property(&mut self, key: &str, value: &str) {
        let code = self.code().to_string();
        let metadata = self.metadata_mut();
        if metadata.is_none() {
            *metadata = Some(ErrorMetadata {
                code,
                details: Some(FxHashMap::default()),
                source: None,
                error_source: None,
            });
        }

        if let Some(meta) = metadata {
            if meta.details.is_none() {
                meta.details = Some(FxHashMap::default());
            }
            if let Some(details) = &mut meta.details {
                details.insert(key.to_string(), value.to_string());
            }
        }
    }

    pub fn get_property(&self, key: &str) -> Option<&str> {
        self.metadata()
            .and_then(|meta| meta.details.as_ref())
            .and_then(|details| details.get(key))
            .map(String::as_str)
    }
}

impl From<std::io::Error> for PharosError {
    fn from(error: std::io::Error) -> Self {
        Self::IoError(
            error.to_string(),
            Some(ErrorMetadata {
                code: "IO_ERROR".to_string(),
                details: None,
                source: Some("std::io::Error".to_string()),
                error_source: None,
            }),
        )
    }
}

impl From<tokio::time::error::Elapsed> for PharosError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        Self::Timeout(error.to_string(), None)
    }
}

impl From<String> for PharosError {
    fn from(error: String) -> Self {
        Self::Internal(error, None)
    }
}

impl From<&str> for PharosError {
    fn from(error: &str) -> Self {
        Self::Internal(error.to_string(), None)
    }
}

impl From<serde_json::Error> for PharosError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(
            error.to_string(),
            Some(ErrorMetadata {
                code: "JSON_ERROR".to_string(),
                details: None,
                source: Some("serde_json".to_string()),
                error_source: None,
            }),
        )
    }
}

impl From<reqwest::Error> for PharosError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(
            error.to_string(),
            Some(ErrorMetadata {
                code: "NETWORK".to_string(),
                details: None,
                source: Some("reqwest".to_string()),
                error_source: None,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: PharosError = io_error.into();

        match error {
            PharosError::IoError(msg, _) => {
                assert!(msg.contains("file not found"));
            }
            _ => panic!("Expected IoError variant"),
        }
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: PharosError = json_error.into();

        assert_eq!(error.code(), "SERIALIZATION_ERROR");
    }

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            PharosError::network("connection refused").to_string(),
            "Network error: connection refused"
        );
        assert_eq!(
            PharosError::load_failed("chunk-42").to_string(),
            "Load failed: chunk-42"
        );
        assert_eq!(PharosError::internal("boom").to_string(), "boom");
    }

    #[test]
    fn test_properties_round_trip() {
        let error = PharosError::load_failed("image fetch")
            .with_property("attempts", "3")
            .with_property("url", "https://cdn.example.com/a.webp");

        assert_eq!(error.get_property("attempts"), Some("3"));
        assert_eq!(error.get_property("url"), Some("https://cdn.example.com/a.webp"));
        assert_eq!(error.get_property("missing"), None);
    }

    #[test]
    fn test_with_source_preserves_chain() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = PharosError::storage("persist failed").with_source(Box::new(io_error));

        let source = std::error::Error::source(&error);
        assert!(source.is_some());
        assert!(source.unwrap().to_string().contains("denied"));
    }
}
