//! Emitter construction.

use crate::{Emitter, EmitterResult};
use emitter_config::{
    ConfigError, EmitterConfig, Paths, StoreKind, TrackerSettings, DEFAULT_STORE_CAPACITY,
};
use emitter_transport::{HttpTransport, Transport};
use event_store::{EventStore, MemoryEventStore, SqliteEventStore};
use std::sync::Arc;
use tracing::info;

/// Buffered tick reports per subscriber before the slowest one lags.
pub const DEFAULT_REPORT_CAPACITY: usize = 64;

/// Builder for an [`Emitter`].
///
/// A transport is required. Without a store the emitter queues in memory.
pub struct EmitterBuilder {
    store: Option<Arc<dyn EventStore>>,
    transport: Option<Arc<dyn Transport>>,
    config: EmitterConfig,
    report_capacity: usize,
}

impl Default for EmitterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmitterBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            transport: None,
            config: EmitterConfig::default(),
            report_capacity: DEFAULT_REPORT_CAPACITY,
        }
    }

    /// Stand up the store and HTTP transport described by `settings`.
    pub async fn from_settings(settings: &TrackerSettings, paths: &Paths) -> EmitterResult<Self> {
        let store: Arc<dyn EventStore> = match settings.store.kind {
            StoreKind::Sqlite => {
                let path = settings.store.database_path(paths);
                info!(path = %path.display(), "Opening event store");
                Arc::new(SqliteEventStore::open(&path, settings.store.capacity).await?)
            }
            StoreKind::Memory => Arc::new(MemoryEventStore::new(settings.store.capacity)),
        };
        let transport = Arc::new(HttpTransport::new(&settings.network)?);

        Ok(Self::new()
            .store(store)
            .transport(transport)
            .config(settings.emitter.clone()))
    }

    pub fn store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn config(mut self, config: EmitterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn report_capacity(mut self, capacity: usize) -> Self {
        self.report_capacity = capacity;
        self
    }

    pub fn build(self) -> EmitterResult<Emitter> {
        self.config.validate()?;
        let transport = self
            .transport
            .ok_or_else(|| ConfigError::Invalid("emitter requires a transport".to_string()))?;
        let store: Arc<dyn EventStore> = match self.store {
            Some(store) => store,
            None => Arc::new(MemoryEventStore::new(DEFAULT_STORE_CAPACITY)),
        };

        Ok(Emitter::new(
            store,
            transport,
            self.config,
            self.report_capacity.max(1),
        ))
    }
}
