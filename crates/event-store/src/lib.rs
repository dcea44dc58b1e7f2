//! Durable event queue for the emitter.
//!
//! Events wait here until the collector acknowledges them or they are
//! abandoned. Two backends implement [`EventStore`]:
//!
//! - [`SqliteEventStore`]: one table on a dedicated SQLite thread
//!   (tokio-rusqlite), survives process restarts
//! - [`MemoryEventStore`]: volatile, for hosts that do not need durability
//!
//! Both hand out events oldest first and mark them in-flight so that a
//! concurrent caller never receives the same event twice until it is
//! released or removed.
//!
//! ```ignore
//! let store = SqliteEventStore::open(&path, 10_000).await?;
//! let id = store.enqueue(payload).await?;
//! let batch = store.peek_oldest(150).await?;   // marked in-flight
//! store.remove(&[id]).await?;                  // delivered
//! ```

mod error;
mod memory;
mod migrations;
mod payload;
mod sqlite;
mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryEventStore;
pub use migrations::{run_migrations, CURRENT_VERSION};
pub use payload::{EventId, Payload, QueuedEvent};
pub use sqlite::{SqliteEventStore, StoreStats};
pub use store::EventStore;
