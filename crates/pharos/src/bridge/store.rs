use crate::error::PharosError;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::path::PathBuf;

/// Small string key/value store with localStorage semantics. Implementations
/// must tolerate concurrent access; values are opaque JSON strings.
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, PharosError>;
    fn set(&self, key: &str, value: &str) -> Result<(), PharosError>;
    fn remove(&self, key: &str) -> Result<(), PharosError>;
}

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<FxHashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, PharosError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PharosError> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PharosError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Persists the whole table as one JSON object, written through on every
/// mutation. Intended for the CLI and host shells without their own storage.
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<FxHashMap<String, String>>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PharosError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| PharosError::storage(format!("corrupt store file: {e}")))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FxHashMap::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self { path, entries: RwLock::new(entries) })
    }

    fn persist(&self, entries: &FxHashMap<String, String>) -> Result<(), PharosError> {
        let contents = serde_json::to_string(entries)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, PharosError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PharosError> {
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), PharosError> {
        let mut entries = self.entries.write();
        entries.remove(key);
        self.persist(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        store.set("app_logs", "[]").unwrap();

        assert_eq!(store.get("app_logs").unwrap().as_deref(), Some("[]"));
        assert_eq!(store.get("missing").unwrap(), None);

        store.remove("app_logs").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let store = FileStore::open(&path).unwrap();
            store.set("webVitals", r#"{"LCP":{"value":1200.0}}"#).unwrap();
        }

        let reopened = FileStore::open(&path).unwrap();
        let value = reopened.get("webVitals").unwrap().unwrap();
        assert!(value.contains("LCP"));
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "not json").unwrap();

        let result = FileStore::open(&path);
        assert!(result.is_err());
    }
}
