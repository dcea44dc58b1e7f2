//! File system paths for the emitter.

use crate::{ConfigError, ConfigResult};
use std::path::PathBuf;

/// Directory name under the home directory.
const BASE_DIR_NAME: &str = ".emitter";

/// Manages file system paths for the emitter.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for emitter files (~/.emitter)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.emitter`.
    pub fn new() -> ConfigResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| ConfigError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(BASE_DIR_NAME),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.emitter).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the settings file path (~/.emitter/emitter.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("emitter.json")
    }

    /// Get the event store path (~/.emitter/events.sqlite).
    pub fn database_file(&self) -> PathBuf {
        self.base_dir.join("events.sqlite")
    }

    /// Get the logs directory (~/.emitter/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the log file path (~/.emitter/logs/emitter.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("emitter.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> ConfigResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
