//! Volatile event store.

use crate::{EventId, EventStore, Payload, QueuedEvent, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::debug;

struct Slot {
    event: QueuedEvent,
    in_flight: bool,
}

struct Inner {
    events: BTreeMap<EventId, Slot>,
    next_id: EventId,
}

/// In-memory [`EventStore`]. Same ordering and in-flight rules as
/// [`crate::SqliteEventStore`]; contents are lost with the process.
pub struct MemoryEventStore {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl MemoryEventStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                events: BTreeMap::new(),
                next_id: 1,
            }),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn enqueue(&self, payload: Payload) -> StoreResult<EventId> {
        let mut inner = self.inner.lock().await;
        if inner.events.len() >= self.capacity {
            return Err(StoreError::Full {
                capacity: self.capacity,
            });
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.events.insert(
            id,
            Slot {
                event: QueuedEvent {
                    id,
                    payload,
                    enqueued_at: Utc::now(),
                },
                in_flight: false,
            },
        );

        debug!(id, "Enqueued event");
        Ok(id)
    }

    async fn peek_oldest(&self, limit: usize) -> StoreResult<Vec<QueuedEvent>> {
        let mut inner = self.inner.lock().await;
        let events: Vec<QueuedEvent> = inner
            .events
            .values_mut()
            .filter(|slot| !slot.in_flight)
            .take(limit)
            .map(|slot| {
                slot.in_flight = true;
                slot.event.clone()
            })
            .collect();
        Ok(events)
    }

    async fn remove(&self, ids: &[EventId]) -> StoreResult<usize> {
        let mut inner = self.inner.lock().await;
        let mut removed = 0;
        for id in ids {
            if inner.events.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn release(&self, ids: &[EventId]) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        for id in ids {
            if let Some(slot) = inner.events.get_mut(id) {
                slot.in_flight = false;
            }
        }
        Ok(())
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.inner.lock().await.events.len())
    }

    async fn in_flight_count(&self) -> StoreResult<usize> {
        let inner = self.inner.lock().await;
        Ok(inner.events.values().filter(|slot| slot.in_flight).count())
    }

    async fn remove_all(&self) -> StoreResult<usize> {
        let mut inner = self.inner.lock().await;
        let removed = inner.events.len();
        inner.events.clear();
        Ok(removed)
    }
}
