//! Memory System Configuration
//!
//! Hardcoded defaults overlaid by an optional JSON file. The overlay is a
//! shallow merge per top-level section: keys present in the file replace the
//! matching default keys of that section, everything else keeps its default.
//! Keys the system does not know about are carried through untouched.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::MemoryResult;

/// Default location of the configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "configs/memory_config.json";

/// Longest accepted retention period (100 years)
pub const MAX_RETENTION_DAYS: u32 = 36_500;

/// Memory system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Fast tier (external cache) settings
    pub short_term: ShortTermConfig,

    /// Mid tier (relational store) settings
    pub mid_term: MidTermConfig,

    /// Long tier (vector index) settings
    pub long_term: LongTermConfig,

    /// Unrecognized top-level sections
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            short_term: ShortTermConfig::default(),
            mid_term: MidTermConfig::default(),
            long_term: LongTermConfig::default(),
            extra: Map::new(),
        }
    }
}

/// Fast tier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortTermConfig {
    /// Cache host (default: localhost)
    pub host: String,

    /// Cache port (default: 6379)
    pub port: u16,

    /// Logical cache database index (default: 0)
    pub db: i64,

    /// Default time-to-live in seconds (default: 3600 = 1 hour)
    pub ttl: u64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ShortTermConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 6379,
            db: 0,
            ttl: 3600, // 1 hour
            extra: Map::new(),
        }
    }
}

impl ShortTermConfig {
    /// Connection URL for the external cache
    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

/// Mid tier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidTermConfig {
    /// Path to the SQLite database file
    pub db_path: PathBuf,

    /// Interactions older than this are removed by cleanup (default: 30)
    pub retention_days: u32,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for MidTermConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/memory/mid_term.db"),
            retention_days: 30,
            extra: Map::new(),
        }
    }
}

/// Long tier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongTermConfig {
    /// Directory holding the persistent vector index
    pub db_path: PathBuf,

    /// Similarity threshold for callers that filter search results (default: 0.75)
    pub similarity_threshold: f64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for LongTermConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/memory/long_term"),
            similarity_threshold: 0.75,
            extra: Map::new(),
        }
    }
}

impl MemoryConfig {
    /// Load configuration, never failing.
    ///
    /// - `None`: defaults
    /// - missing file: defaults, written out to `path` for the next run
    /// - unreadable, ill-typed or invalid file: defaults (logged)
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        if !path.exists() {
            let config = Self::default();
            match config.write_to(path) {
                Ok(()) => tracing::info!(path = %path.display(), "Wrote default memory config"),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Could not write default memory config"),
            }
            return config;
        }

        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Error loading memory config, using defaults");
                Self::default()
            }
        }
    }

    /// Read a config file, merge it over the defaults and validate the result
    pub fn load_from(path: &Path) -> MemoryResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let loaded: Value = serde_json::from_str(&raw)?;
        let config = Self::merged_with(loaded)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay a loaded JSON document on the defaults, one section at a time
    pub fn merged_with(loaded: Value) -> MemoryResult<Self> {
        let mut merged = serde_json::to_value(Self::default())?;

        if let (Value::Object(base), Value::Object(overlay)) = (&mut merged, loaded) {
            for (section, value) in overlay {
                match (base.get_mut(&section), value) {
                    (Some(Value::Object(defaults)), Value::Object(overrides)) => {
                        defaults.extend(overrides);
                    }
                    (_, value) => {
                        base.insert(section, value);
                    }
                }
            }
        }

        Ok(serde_json::from_value(merged)?)
    }

    /// Write this configuration as pretty JSON, creating parent directories
    pub fn write_to(&self, path: &Path) -> MemoryResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Create the directories the mid and long tiers write into
    pub fn ensure_directories(&self) -> MemoryResult<()> {
        if let Some(parent) = self.mid_term.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::create_dir_all(&self.long_term.db_path)?;
        Ok(())
    }

    /// Set the fast tier configuration
    pub fn with_short_term(mut self, short_term: ShortTermConfig) -> Self {
        self.short_term = short_term;
        self
    }

    /// Set the mid tier configuration
    pub fn with_mid_term(mut self, mid_term: MidTermConfig) -> Self {
        self.mid_term = mid_term;
        self
    }

    /// Set the long tier configuration
    pub fn with_long_term(mut self, long_term: LongTermConfig) -> Self {
        self.long_term = long_term;
        self
    }

    /// Root every data path under `dir` (used by tests and the CLI `--data-dir`)
    pub fn with_data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.mid_term.db_path = dir.join("mid_term.db");
        self.long_term.db_path = dir.join("long_term");
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.short_term.ttl == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "short_term.ttl".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.mid_term.retention_days == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "mid_term.retention_days".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.mid_term.retention_days > MAX_RETENTION_DAYS {
            return Err(ConfigValidationError::InvalidValue {
                field: "mid_term.retention_days".into(),
                message: format!("must be at most {MAX_RETENTION_DAYS}"),
            });
        }

        let threshold = self.long_term.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigValidationError::InvalidValue {
                field: "long_term.similarity_threshold".into(),
                message: "must be between 0 and 1".into(),
            });
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = MemoryConfig::default();
        assert_eq!(config.short_term.host, "localhost");
        assert_eq!(config.short_term.port, 6379);
        assert_eq!(config.short_term.ttl, 3600);
        assert_eq!(config.mid_term.retention_days, 30);
        assert_eq!(config.long_term.db_path, PathBuf::from("data/memory/long_term"));
        assert!((config.long_term.similarity_threshold - 0.75).abs() < f64::EPSILON);
        assert_eq!(config.short_term.url(), "redis://localhost:6379/0");
    }

    #[test]
    fn test_defaults_serialize_verbatim() {
        let value = serde_json::to_value(MemoryConfig::default()).unwrap();
        assert_eq!(
            value,
            json!({
                "short_term": { "host": "localhost", "port": 6379, "db": 0, "ttl": 3600 },
                "mid_term": { "db_path": "data/memory/mid_term.db", "retention_days": 30 },
                "long_term": { "db_path": "data/memory/long_term", "similarity_threshold": 0.75 }
            })
        );
    }

    #[test]
    fn test_section_merge_keeps_other_defaults() {
        let config = MemoryConfig::merged_with(json!({
            "short_term": { "port": 6380 },
            "mid_term": { "retention_days": 7 }
        }))
        .unwrap();

        assert_eq!(config.short_term.port, 6380);
        assert_eq!(config.short_term.host, "localhost");
        assert_eq!(config.short_term.ttl, 3600);
        assert_eq!(config.mid_term.retention_days, 7);
        assert_eq!(config.mid_term.db_path, PathBuf::from("data/memory/mid_term.db"));
        assert_eq!(config.long_term, LongTermConfig::default());
    }

    #[test]
    fn test_unknown_keys_preserved() {
        let config = MemoryConfig::merged_with(json!({
            "short_term": { "password_env": "REDIS_PASSWORD" },
            "telemetry": { "enabled": false }
        }))
        .unwrap();

        assert_eq!(config.short_term.extra.get("password_env"), Some(&json!("REDIS_PASSWORD")));
        assert_eq!(config.extra.get("telemetry"), Some(&json!({ "enabled": false })));

        let round_trip = serde_json::to_value(&config).unwrap();
        assert_eq!(round_trip["telemetry"]["enabled"], json!(false));
        assert_eq!(round_trip["short_term"]["password_env"], json!("REDIS_PASSWORD"));
    }

    #[test]
    fn test_ill_typed_section_is_an_error() {
        assert!(MemoryConfig::merged_with(json!({ "short_term": { "port": "six" } })).is_err());
    }

    #[test]
    fn test_load_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configs").join("memory_config.json");

        let config = MemoryConfig::load(Some(&path));
        assert_eq!(config, MemoryConfig::default());
        assert!(path.exists());

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, serde_json::to_value(MemoryConfig::default()).unwrap());
    }

    #[test]
    fn test_load_garbage_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory_config.json");
        std::fs::write(&path, "{ this is not json").unwrap();

        assert_eq!(MemoryConfig::load(Some(&path)), MemoryConfig::default());
    }

    #[test]
    fn test_load_invalid_values_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory_config.json");
        std::fs::write(&path, r#"{ "short_term": { "ttl": 0 } }"#).unwrap();

        assert_eq!(MemoryConfig::load(Some(&path)), MemoryConfig::default());
    }

    #[test]
    fn test_load_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory_config.json");
        std::fs::write(&path, r#"{ "long_term": { "similarity_threshold": 0.5 } }"#).unwrap();

        let config = MemoryConfig::load(Some(&path));
        assert!((config.long_term.similarity_threshold - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.short_term, ShortTermConfig::default());
    }

    #[test]
    fn test_config_validation() {
        let mut config = MemoryConfig::default();
        assert!(config.validate().is_ok());

        config.short_term.ttl = 0;
        assert!(config.validate().is_err());

        let mut config = MemoryConfig::default();
        config.long_term.similarity_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = MemoryConfig::default();
        config.mid_term.retention_days = 0;
        assert!(config.validate().is_err());

        config.mid_term.retention_days = MAX_RETENTION_DAYS;
        assert!(config.validate().is_ok());
        config.mid_term.retention_days = 100_000_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_reports_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory_config.json");
        std::fs::write(&path, r#"{ "mid_term": { "retention_days": 100000000 } }"#).unwrap();

        let err = MemoryConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, crate::MemoryError::Config(_)), "{err}");
        assert_eq!(MemoryConfig::load(Some(&path)), MemoryConfig::default());
    }

    #[test]
    fn test_ensure_directories() {
        let dir = tempfile::tempdir().unwrap();
        let config = MemoryConfig::default().with_data_dir(dir.path().join("data"));

        config.ensure_directories().unwrap();
        assert!(dir.path().join("data").is_dir());
        assert!(config.long_term.db_path.is_dir());
    }
}
