//! The queue contract shared by every backend.

use crate::{EventId, Payload, QueuedEvent, StoreResult};
use async_trait::async_trait;

/// Ordered, id-indexed queue of events awaiting delivery.
///
/// Every method is atomic with respect to concurrent callers. The in-flight
/// mark set by [`EventStore::peek_oldest`] is what keeps two ticks from
/// sending the same event at once.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persist a payload and return its id.
    ///
    /// Fails with [`crate::StoreError::Full`] once the store holds its
    /// capacity. The event is durable when this returns.
    async fn enqueue(&self, payload: Payload) -> StoreResult<EventId>;

    /// Up to `limit` oldest events that are not in flight, oldest first.
    /// Returned events are marked in-flight but stay stored. Stored events
    /// that can no longer be decoded are deleted, not returned.
    async fn peek_oldest(&self, limit: usize) -> StoreResult<Vec<QueuedEvent>>;

    /// Delete events. Unknown ids are ignored. Returns how many were removed.
    async fn remove(&self, ids: &[EventId]) -> StoreResult<usize>;

    /// Clear the in-flight mark so the events can be picked again.
    async fn release(&self, ids: &[EventId]) -> StoreResult<()>;

    /// Number of stored events, in flight or not.
    async fn count(&self) -> StoreResult<usize>;

    async fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.count().await? == 0)
    }

    /// Number of events currently marked in flight.
    async fn in_flight_count(&self) -> StoreResult<usize>;

    /// Delete every event. Returns how many were removed.
    async fn remove_all(&self) -> StoreResult<usize>;
}
