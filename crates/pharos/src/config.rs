use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Development => write!(f, "development"),
            Mode::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    Analytics,
    PerformanceTracking,
    WebVitals,
    LighthouseMonitor,
    MemoryMonitoring,
    ConsoleLogging,
    LocalStorage,
    ErrorReporting,
    ResourceHints,
    LazyLoading,
}

impl Feature {
    pub const ALL: [Feature; 10] = [
        Feature::Analytics,
        Feature::PerformanceTracking,
        Feature::WebVitals,
        Feature::LighthouseMonitor,
        Feature::MemoryMonitoring,
        Feature::ConsoleLogging,
        Feature::LocalStorage,
        Feature::ErrorReporting,
        Feature::ResourceHints,
        Feature::LazyLoading,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Feature::Analytics => "analytics",
            Feature::PerformanceTracking => "performance_tracking",
            Feature::WebVitals => "web_vitals",
            Feature::LighthouseMonitor => "lighthouse_monitor",
            Feature::MemoryMonitoring => "memory_monitoring",
            Feature::ConsoleLogging => "console_logging",
            Feature::LocalStorage => "local_storage",
            Feature::ErrorReporting => "error_reporting",
            Feature::ResourceHints => "resource_hints",
            Feature::LazyLoading => "lazy_loading",
        }
    }

    pub fn env_var(self) -> &'static str {
        match self {
            Feature::Analytics => "PHAROS_FEATURE_ANALYTICS",
            Feature::PerformanceTracking => "PHAROS_FEATURE_PERFORMANCE_TRACKING",
            Feature::WebVitals => "PHAROS_FEATURE_WEB_VITALS",
            Feature::LighthouseMonitor => "PHAROS_FEATURE_LIGHTHOUSE_MONITOR",
            Feature::MemoryMonitoring => "PHAROS_FEATURE_MEMORY_MONITORING",
            Feature::ConsoleLogging => "PHAROS_FEATURE_CONSOLE_LOGGING",
            Feature::LocalStorage => "PHAROS_FEATURE_LOCAL_STORAGE",
            Feature::ErrorReporting => "PHAROS_FEATURE_ERROR_REPORTING",
            Feature::ResourceHints => "PHAROS_FEATURE_RESOURCE_HINTS",
            Feature::LazyLoading => "PHAROS_FEATURE_LAZY_LOADING",
        }
    }

    fn default_enabled(self, mode: Mode) -> bool {
        match self {
            Feature::Analytics | Feature::PerformanceTracking => mode == Mode::Production,
            _ => true,
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Flag set resolved once at startup; lookups afterwards are pure and
/// never touch the environment.
#[derive(Debug, Clone)]
pub struct FeatureFlags {
    flags: FxHashMap<Feature, bool>,
}

impl FeatureFlags {
    pub fn defaults(mode: Mode) -> Self {
        let mut flags = FxHashMap::default();
        for feature in Feature::ALL {
            flags.insert(feature, feature.default_enabled(mode));
        }
        Self { flags }
    }

    pub fn from_env(mode: Mode) -> Self {
        let mut resolved = Self::defaults(mode);
        for feature in Feature::ALL {
            if let Ok(value) = std::env::var(feature.env_var()) {
                resolved.flags.insert(feature, parse_bool(&value));
            }
        }
        resolved
    }

    pub fn all_enabled() -> Self {
        let mut flags = FxHashMap::default();
        for feature in Feature::ALL {
            flags.insert(feature, true);
        }
        Self { flags }
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.flags.get(&feature).copied().unwrap_or(false)
    }

    pub fn set(&mut self, feature: Feature, enabled: bool) {
        self.flags.insert(feature, enabled);
    }
}

fn parse_bool(value: &str) -> bool {
    value.to_lowercase() == "true" || value == "1" || value.to_lowercase() == "yes"
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub buffer_capacity: usize,
    pub persist_capacity: usize,
    pub flush_interval_ms: u64,
    pub batch_size: usize,
    pub rate_limit_max: u32,
    pub rate_limit_window_ms: u64,
    pub rate_limit_max_keys: usize,
    pub endpoint: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 500,
            persist_capacity: 100,
            flush_interval_ms: 5_000,
            batch_size: 50,
            rate_limit_max: 10,
            rate_limit_window_ms: 60_000,
            rate_limit_max_keys: 1024,
            endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VitalsConfig {
    pub poll_interval_ms: u64,
    pub settle_window_ms: u64,
}

impl Default for VitalsConfig {
    fn default() -> Self {
        Self { poll_interval_ms: 5_000, settle_window_ms: 5_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub image_retry_base_ms: u64,
    pub load_timeout_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1_000,
            image_retry_base_ms: 1_000,
            load_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub default_ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: 50, default_ttl_ms: 60_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub mode: Mode,
    pub telemetry: TelemetryConfig,
    pub vitals: VitalsConfig,
    pub loader: LoaderConfig,
    pub cache: CacheConfig,
}

impl Config {
    pub fn new(mode: Mode) -> Self {
        Self { mode, ..Self::default() }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(mode_str) = std::env::var("PHAROS_MODE") {
            config.mode = match mode_str.to_lowercase().as_str() {
                "development" | "dev" => Mode::Development,
                "production" | "prod" => Mode::Production,
                _ => return Err(ConfigError::InvalidMode(mode_str)),
            };
        }

        if let Ok(endpoint) = std::env::var("PHAROS_LOG_ENDPOINT") {
            config.telemetry.endpoint = Some(endpoint);
        }

        if let Ok(capacity_str) = std::env::var("PHAROS_BUFFER_CAPACITY") {
            config.telemetry.buffer_capacity = capacity_str
                .parse()
                .map_err(|_| ConfigError::InvalidConfig("PHAROS_BUFFER_CAPACITY".to_string()))?;
        }

        if let Ok(interval_str) = std::env::var("PHAROS_FLUSH_INTERVAL_MS") {
            config.telemetry.flush_interval_ms = interval_str
                .parse()
                .map_err(|_| ConfigError::InvalidConfig("PHAROS_FLUSH_INTERVAL_MS".to_string()))?;
        }

        if let Ok(limit_str) = std::env::var("PHAROS_RATE_LIMIT_MAX") {
            config.telemetry.rate_limit_max = limit_str
                .parse()
                .map_err(|_| ConfigError::InvalidConfig("PHAROS_RATE_LIMIT_MAX".to_string()))?;
        }

        if let Ok(interval_str) = std::env::var("PHAROS_VITALS_POLL_INTERVAL_MS") {
            config.vitals.poll_interval_ms = interval_str.parse().map_err(|_| {
                ConfigError::InvalidConfig("PHAROS_VITALS_POLL_INTERVAL_MS".to_string())
            })?;
        }

        if let Ok(retries_str) = std::env::var("PHAROS_MAX_RETRY_ATTEMPTS") {
            config.loader.max_retries = retries_str
                .parse()
                .map_err(|_| ConfigError::InvalidConfig("PHAROS_MAX_RETRY_ATTEMPTS".to_string()))?;
        }

        if let Ok(delay_str) = std::env::var("PHAROS_RETRY_DELAY_MS") {
            config.loader.retry_delay_ms = delay_str
                .parse()
                .map_err(|_| ConfigError::InvalidConfig("PHAROS_RETRY_DELAY_MS".to_string()))?;
        }

        if let Ok(timeout_str) = std::env::var("PHAROS_LOAD_TIMEOUT_MS") {
            config.loader.load_timeout_ms = timeout_str
                .parse()
                .map_err(|_| ConfigError::InvalidConfig("PHAROS_LOAD_TIMEOUT_MS".to_string()))?;
        }

        if let Ok(entries_str) = std::env::var("PHAROS_CACHE_MAX_ENTRIES") {
            config.cache.max_entries = entries_str
                .parse()
                .map_err(|_| ConfigError::InvalidConfig("PHAROS_CACHE_MAX_ENTRIES".to_string()))?;
        }

        if let Ok(ttl_str) = std::env::var("PHAROS_CACHE_TTL_MS") {
            config.cache.default_ttl_ms = ttl_str
                .parse()
                .map_err(|_| ConfigError::InvalidConfig("PHAROS_CACHE_TTL_MS".to_string()))?;
        }

        Ok(config)
    }

    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::FileRead)?;

        toml::from_str(&contents).map_err(ConfigError::TomlParse)
    }

    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self).map_err(ConfigError::TomlSerialize)?;

        std::fs::write(path, contents).map_err(ConfigError::FileWrite)
    }

    pub fn is_development(&self) -> bool {
        self.mode == Mode::Development
    }

    pub fn is_production(&self) -> bool {
        self.mode == Mode::Production
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.telemetry.flush_interval_ms)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.telemetry.rate_limit_window_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.vitals.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.loader.retry_delay_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.loader.load_timeout_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid mode: {0}")]
    InvalidMode(String),

    #[error("Invalid config value for {0}")]
    InvalidConfig(String),

    #[error("Failed to read config file: {0}")]
    FileRead(std::io::Error),

    #[error("Failed to write config file: {0}")]
    FileWrite(std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    TomlSerialize(toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.mode, Mode::Development);
        assert_eq!(config.telemetry.buffer_capacity, 500);
        assert_eq!(config.telemetry.rate_limit_max, 10);
        assert_eq!(config.cache.max_entries, 50);
        assert_eq!(config.loader.max_retries, 3);
    }

    #[test]
    fn test_config_new_with_mode() {
        let config = Config::new(Mode::Production);
        assert_eq!(config.mode, Mode::Production);
        assert!(config.is_production());
        assert!(!config.is_development());
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(Mode::Development.to_string(), "development");
        assert_eq!(Mode::Production.to_string(), "production");
    }

    #[test]
    fn test_duration_helpers() {
        let config = Config::default();
        assert_eq!(config.flush_interval(), Duration::from_secs(5));
        assert_eq!(config.rate_limit_window(), Duration::from_secs(60));
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_feature_defaults_development() {
        let flags = FeatureFlags::defaults(Mode::Development);
        assert!(!flags.is_enabled(Feature::Analytics));
        assert!(!flags.is_enabled(Feature::PerformanceTracking));
        assert!(flags.is_enabled(Feature::WebVitals));
        assert!(flags.is_enabled(Feature::ConsoleLogging));
        assert!(flags.is_enabled(Feature::LazyLoading));
    }

    #[test]
    fn test_feature_defaults_production() {
        let flags = FeatureFlags::defaults(Mode::Production);
        assert!(flags.is_enabled(Feature::Analytics));
        assert!(flags.is_enabled(Feature::PerformanceTracking));
        assert!(flags.is_enabled(Feature::WebVitals));
    }

    #[test]
    fn test_feature_set_override() {
        let mut flags = FeatureFlags::defaults(Mode::Production);
        flags.set(Feature::LazyLoading, false);
        assert!(!flags.is_enabled(Feature::LazyLoading));
        flags.set(Feature::LazyLoading, true);
        assert!(flags.is_enabled(Feature::LazyLoading));
    }

    #[test]
    fn test_parse_bool_accepted_forms() {
        assert!(parse_bool("true"));
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("1"));
        assert!(parse_bool("yes"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("off"));
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pharos.toml");

        let mut config = Config::new(Mode::Production);
        config.telemetry.endpoint = Some("https://logs.example.com/ingest".to_string());
        config.cache.max_entries = 128;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.mode, Mode::Production);
        assert_eq!(loaded.telemetry.endpoint.as_deref(), Some("https://logs.example.com/ingest"));
        assert_eq!(loaded.cache.max_entries, 128);
    }

    #[test]
    fn test_feature_env_var_names() {
        assert_eq!(Feature::WebVitals.env_var(), "PHAROS_FEATURE_WEB_VITALS");
        assert_eq!(Feature::LazyLoading.env_var(), "PHAROS_FEATURE_LAZY_LOADING");
        for feature in Feature::ALL {
            assert!(feature.env_var().starts_with("PHAROS_FEATURE_"));
        }
    }
}
