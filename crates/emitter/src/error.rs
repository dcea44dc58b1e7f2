//! Error types for the emitter.

use event_store::StoreError;
use thiserror::Error;

/// Emitter error type.
///
/// Only producer- and setup-facing calls return these. A tick never fails:
/// its problems end up in the [`crate::TickReport`].
#[derive(Error, Debug)]
pub enum EmitterError {
    /// The queue is at capacity; the caller keeps or drops the event
    #[error("Event store full (capacity {capacity})")]
    StoreFull { capacity: usize },

    /// Event store error
    #[error("Store error: {0}")]
    Store(StoreError),

    /// Transport construction error
    #[error("Transport error: {0}")]
    Transport(#[from] emitter_transport::TransportError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] emitter_config::ConfigError),

    /// Background loop already running
    #[error("Emitter already started")]
    AlreadyStarted,
}

impl From<StoreError> for EmitterError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Full { capacity } => EmitterError::StoreFull { capacity },
            other => EmitterError::Store(other),
        }
    }
}

/// Result type for emitter operations.
pub type EmitterResult<T> = Result<T, EmitterError>;
