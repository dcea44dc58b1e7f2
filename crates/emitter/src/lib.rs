//! Telemetry event emitter.
//!
//! Producers [`Emitter::submit`] payloads; the emitter persists them in an
//! [`event_store::EventStore`] and delivers them to a collector in batches.
//!
//! # Architecture
//!
//! - [`assembler`]: packs a pulled batch into requests under group and byte limits
//! - [`dispatcher`]: sends requests through a fixed number of concurrent slots
//! - [`retry`]: maps each outcome to delivered, retryable or dropped
//! - [`Emitter`]: ticks, pause/resume, flush, config hot-swap, reports
//!
//! Delivery is at-least-once: an event leaves the store only after a 2xx or
//! a permanent rejection.
//!
//! ```ignore
//! let emitter = EmitterBuilder::from_settings(&settings, &paths).await?.build()?;
//! emitter.start(settings.flush_interval()).await?;
//! emitter.submit(Payload::new().with("e", "pv")).await?;
//! ```

pub mod assembler;
mod builder;
pub mod dispatcher;
mod emitter;
mod error;
mod report;
pub mod retry;

#[cfg(test)]
mod tests;

pub use assembler::{assemble, Assembly, SENT_TIMESTAMP_KEY};
pub use builder::{EmitterBuilder, DEFAULT_REPORT_CAPACITY};
pub use dispatcher::{Dispatch, Dispatcher};
pub use emitter::{Emitter, EmitterState};
pub use error::{EmitterError, EmitterResult};
pub use report::{RequestReport, TickReport};
pub use retry::{classify, classify_status, Disposition};

pub use emitter_config::{BufferOption, EmitterConfig, EmitterConfigUpdate, HttpMethod};
pub use event_store::{EventId, Payload};
