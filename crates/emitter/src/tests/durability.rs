//! SQLite-backed emitter across process restarts.

use super::harness::{page_view, MockResponse, MockTransport};
use crate::{Emitter, EmitterBuilder, EmitterConfig};
use event_store::{EventStore, SqliteEventStore};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

async fn open_emitter(path: &Path, transport: Arc<MockTransport>) -> (Emitter, SqliteEventStore) {
    let store = SqliteEventStore::open(path, 1_000).await.unwrap();
    let emitter = EmitterBuilder::new()
        .store(Arc::new(store.clone()))
        .transport(transport)
        .config(EmitterConfig::default())
        .build()
        .unwrap();
    (emitter, store)
}

#[tokio::test]
async fn undelivered_events_survive_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("events.sqlite");

    let offline = MockTransport::post();
    offline.set_default_response(MockResponse::Fail);
    let mut ids = Vec::new();
    {
        let (emitter, _store) = open_emitter(&path, offline.clone()).await;
        for n in 0..5 {
            ids.push(emitter.submit(page_view(n)).await.unwrap());
        }
        let report = emitter.tick().await;
        assert!(report.offline);
    }

    let online = MockTransport::post();
    let (emitter, store) = open_emitter(&path, online.clone()).await;
    assert_eq!(store.count().await.unwrap(), 5);

    let report = emitter.flush_now().await;

    assert_eq!(report.success_count, 5);
    let mut received = online.received_event_ids();
    received.sort_unstable();
    assert_eq!(received, ids);
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn events_in_flight_at_crash_are_resent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("events.sqlite");

    let store = SqliteEventStore::open(&path, 1_000).await.unwrap();
    for n in 0..3 {
        store.enqueue(page_view(n)).await.unwrap();
    }
    // Pulled by a tick that never finished.
    let pulled = store.peek_oldest(2).await.unwrap();
    assert_eq!(store.in_flight_count().await.unwrap(), 2);
    store.close().await.unwrap();

    let transport = MockTransport::post();
    let (emitter, store) = open_emitter(&path, transport.clone()).await;
    assert_eq!(store.in_flight_count().await.unwrap(), 0);

    let report = emitter.tick().await;

    assert_eq!(report.success_count, 3);
    let received = transport.received_event_ids();
    assert_eq!(received.len(), 3);
    assert!(pulled.iter().all(|event| received.contains(&event.id)));
}

#[tokio::test]
async fn retried_events_keep_queue_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("events.sqlite");
    let transport = MockTransport::post();
    let (emitter, _store) = open_emitter(&path, transport.clone()).await;

    let mut ids = Vec::new();
    for n in 0..3 {
        ids.push(emitter.submit(page_view(n)).await.unwrap());
    }
    // The oldest event is refused once.
    let oldest = ids[0];
    let refused = AtomicBool::new(false);
    transport.set_rule(move |request| {
        (request.event_ids[0] == oldest && !refused.swap(true, Ordering::SeqCst))
            .then_some(MockResponse::Status(503))
    });

    let first = emitter.tick().await;
    assert_eq!(first.retry_count, 1);
    assert_eq!(first.success_count, 2);

    let second = emitter.tick().await;
    assert_eq!(second.requests[0].event_ids, vec![ids[0]]);
    assert_eq!(second.success_count, 1);
}

#[tokio::test]
async fn corrupt_row_does_not_block_newer_events() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("events.sqlite");
    let transport = MockTransport::post();
    let (emitter, store) = open_emitter(&path, transport.clone()).await;

    let raw = rusqlite::Connection::open(&path).unwrap();
    raw.execute(
        "INSERT INTO events (payload, enqueued_at) VALUES (?1, ?2)",
        rusqlite::params![b"not json".to_vec(), chrono::Utc::now().to_rfc3339()],
    )
    .unwrap();
    drop(raw);
    let good = emitter.submit(page_view(1)).await.unwrap();

    let report = emitter.flush_now().await;

    assert!(report.store_error.is_none());
    assert_eq!(report.success_count, 1);
    assert_eq!(transport.received_event_ids(), vec![good]);
    assert_eq!(store.count().await.unwrap(), 0);
}
