//! Tracker settings file with environment overrides.

use crate::{ConfigResult, EmitterConfig, HttpMethod, NetworkConfig, Paths};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// Default interval between timer-driven ticks.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 10_000;
/// Default store capacity (events).
pub const DEFAULT_STORE_CAPACITY: usize = 10_000;

/// Which queue backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Sqlite,
    Memory,
}

/// Event store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// SQLite file. Falls back to [`Paths::database_file`] when unset.
    pub path: Option<PathBuf>,
    pub capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Sqlite,
            path: None,
            capacity: DEFAULT_STORE_CAPACITY,
        }
    }
}

impl StoreConfig {
    /// Resolved database path.
    pub fn database_path(&self, paths: &Paths) -> PathBuf {
        self.path.clone().unwrap_or_else(|| paths.database_file())
    }
}

/// Everything a host needs to stand up an emitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Interval between timer-driven ticks in milliseconds.
    pub flush_interval_ms: u64,
    pub emitter: EmitterConfig,
    pub network: NetworkConfig,
    pub store: StoreConfig,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            emitter: EmitterConfig::default(),
            network: NetworkConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl TrackerSettings {
    /// Defaults, then environment overrides.
    pub fn new() -> Self {
        let mut settings = Self::default();
        settings.load_from_env();
        settings
    }

    /// Load settings from `emitter.json`, falling back to defaults, then apply
    /// environment overrides.
    pub fn load(paths: &Paths) -> ConfigResult<Self> {
        let config_path = paths.config_file();

        let mut settings = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        settings.load_from_env();
        settings.emitter.validate()?;

        Ok(settings)
    }

    /// Load settings from a specific file.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: TrackerSettings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to `emitter.json`.
    pub fn save(&self, paths: &Paths) -> ConfigResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    fn load_from_env(&mut self) {
        if let Ok(level) = std::env::var("EMITTER_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Ok(endpoint) = std::env::var("EMITTER_ENDPOINT") {
            self.network.endpoint = endpoint;
        }
        if let Ok(raw) = std::env::var("EMITTER_METHOD") {
            match raw.parse::<HttpMethod>() {
                Ok(method) => self.network.method = method,
                Err(e) => tracing::warn!(value = %raw, error = %e, "ignoring EMITTER_METHOD"),
            }
        }
        if let Ok(raw) = std::env::var("EMITTER_FLUSH_INTERVAL_MS") {
            match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => self.flush_interval_ms = ms,
                _ => tracing::warn!(value = %raw, "ignoring EMITTER_FLUSH_INTERVAL_MS"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BufferOption;
    use tempfile::tempdir;

    #[test]
    fn test_default_settings() {
        let settings = TrackerSettings::default();
        assert_eq!(settings.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(settings.flush_interval(), Duration::from_secs(10));
        assert_eq!(settings.store.kind, StoreKind::Sqlite);
        assert_eq!(settings.store.capacity, DEFAULT_STORE_CAPACITY);
    }

    #[test]
    fn test_load_from_file_partial() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("emitter.json");
        std::fs::write(
            &path,
            r#"{
                "emitter": { "buffer_option": "default_group", "emit_range": 50 },
                "network": { "endpoint": "collector.example.com", "method": "get" },
                "store": { "kind": "memory", "capacity": 5 }
            }"#,
        )
        .unwrap();

        let settings = TrackerSettings::load_from_file(&path).unwrap();
        assert_eq!(settings.emitter.buffer_option, BufferOption::DefaultGroup);
        assert_eq!(settings.emitter.emit_range, 50);
        assert_eq!(settings.emitter.thread_pool_size, 15);
        assert_eq!(settings.network.method, HttpMethod::Get);
        assert_eq!(settings.store.kind, StoreKind::Memory);
        assert_eq!(settings.store.capacity, 5);
        assert_eq!(settings.flush_interval_ms, DEFAULT_FLUSH_INTERVAL_MS);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().join("emitter"));

        let mut settings = TrackerSettings::default();
        settings.network.endpoint = "https://c.example.com".into();
        settings.emitter.byte_limit_post = 1234;
        settings.save(&paths).unwrap();

        let loaded = TrackerSettings::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded.network.endpoint, "https://c.example.com");
        assert_eq!(loaded.emitter.byte_limit_post, 1234);
    }

    #[test]
    fn test_load_rejects_invalid_emitter_config() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        std::fs::write(paths.config_file(), r#"{"emitter": {"thread_pool_size": 0}}"#).unwrap();

        assert!(TrackerSettings::load(&paths).is_err());
    }

    #[test]
    fn test_store_database_path_fallback() {
        let paths = Paths::with_base_dir(PathBuf::from("/tmp/emitter-test"));
        let store = StoreConfig::default();
        assert_eq!(store.database_path(&paths), paths.database_file());

        let store = StoreConfig {
            path: Some(PathBuf::from("/data/q.sqlite")),
            ..Default::default()
        };
        assert_eq!(store.database_path(&paths), PathBuf::from("/data/q.sqlite"));
    }
}
