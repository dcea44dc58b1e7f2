//! Configuration, paths and logging setup for the event emitter.

mod config;
mod error;
mod logging;
mod network;
mod paths;
mod settings;

pub use config::{
    BufferOption, EmitterConfig, EmitterConfigUpdate, DEFAULT_BYTE_LIMIT_GET,
    DEFAULT_BYTE_LIMIT_POST, DEFAULT_EMIT_RANGE, DEFAULT_THREAD_POOL_SIZE,
};
pub use error::{ConfigError, ConfigResult};
pub use logging::{init_logging, init_logging_for_service, parse_level};
pub use network::{HttpMethod, NetworkConfig, Protocol, DEFAULT_POST_PATH, GET_PATH};
pub use paths::Paths;
pub use settings::{
    StoreConfig, StoreKind, TrackerSettings, DEFAULT_FLUSH_INTERVAL_MS, DEFAULT_LOG_LEVEL,
    DEFAULT_STORE_CAPACITY,
};
