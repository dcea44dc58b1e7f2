//! Logging initialization for emitter binaries.
//!
//! Thin wrappers over the observability crate. Logs go to stderr and, when a
//! log file is given, to a JSONL file as well.

use std::path::PathBuf;

/// Initialize logging for the emitter with stderr output only.
///
/// `level` is used when `RUST_LOG` is not set.
///
/// ```ignore
/// init_logging("info");
/// tracing::info!("emitter started");
/// ```
pub fn init_logging(level: &str) {
    init_logging_for_service("emitter", level, None);
}

/// Initialize logging with a custom service name and optional JSONL file.
pub fn init_logging_for_service(service_name: &str, level: &str, log_path: Option<PathBuf>) {
    observability::init_with_config(observability::LogConfig {
        service_name: service_name.into(),
        default_level: parse_level(level).as_str().to_ascii_lowercase(),
        log_path,
        also_stderr: true,
    });
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
