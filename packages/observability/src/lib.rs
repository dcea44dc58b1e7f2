//! # Observability
//!
//! Shared logging setup for every binary in the emitter workspace.
//!
//! Services are log producers only. They call [`init_with_config`] once at
//! startup and use the plain `tracing` macros everywhere else:
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "emitterctl".into(),
//!     default_level: "debug".into(),
//!     also_stderr: true,
//!     ..Default::default()
//! });
//! tracing::info!("ready");
//! ```
//!
//! Two sinks are available and may be combined:
//!
//! - a JSONL file (one object per line, service name on every line), enabled
//!   by setting [`LogConfig::log_path`]
//! - a compact human-readable stream on stderr
//!
//! The level filter comes from `RUST_LOG` when set, otherwise from
//! [`LogConfig::default_level`].

mod file_writer;
mod jsonl;

use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use file_writer::AppendFileWriter;
pub use jsonl::{JsonlLayer, LogLine};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, written on every JSONL line.
    pub service_name: String,

    /// Default filter directive (e.g. "info", "emitter=debug").
    /// Overridden by `RUST_LOG`.
    pub default_level: String,

    /// JSONL output file. No file sink when unset.
    pub log_path: Option<PathBuf>,

    /// Also emit compact logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize logging with default settings for `service_name`.
pub fn init(service_name: &str) -> bool {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        also_stderr: true,
        ..Default::default()
    })
}

/// Install the global subscriber.
///
/// Returns `false` when a global subscriber was already installed (for
/// example by an earlier call in the same test binary); the existing one is
/// kept. If the log file cannot be opened the file sink is skipped and the
/// failure is reported on stderr.
pub fn init_with_config(config: LogConfig) -> bool {
    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.default_level))
    };

    let file_layer = config.log_path.as_ref().and_then(|path| {
        match AppendFileWriter::open(path) {
            Ok(writer) => Some(
                JsonlLayer::new(config.service_name.clone(), writer).with_filter(filter()),
            ),
            Err(e) => {
                eprintln!("observability: cannot open {}: {}", path.display(), e);
                None
            }
        }
    });

    let stderr_layer = config.also_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .compact()
            .with_writer(std::io::stderr)
            .with_filter(filter())
    });

    let installed = tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(
            service = %config.service_name,
            log_path = ?config.log_path,
            "observability initialized"
        );
    }
    installed
}

/// Re-exported so services can depend on this crate alone.
pub use tracing::{debug, error, info, trace, warn, Level};
