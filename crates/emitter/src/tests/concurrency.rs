//! Tick serialization and the concurrent send limit.

use super::harness::{MockResponse, TestHarness};
use crate::{BufferOption, EmitterConfig, EmitterConfigUpdate, EmitterState};
use event_store::EventStore;
use std::collections::HashSet;
use std::time::Duration;
use tokio::task::JoinSet;

#[tokio::test]
async fn concurrent_ticks_never_duplicate_events() {
    let harness = TestHarness::new(EmitterConfig {
        buffer_option: BufferOption::DefaultGroup,
        emit_range: 10,
        thread_pool_size: 3,
        ..Default::default()
    });
    harness
        .transport
        .set_default_response(MockResponse::DelayThenStatus(Duration::from_millis(15), 200));
    let ids = harness.submit_events(30).await;

    let mut ticks = JoinSet::new();
    for _ in 0..6 {
        let emitter = harness.emitter.clone();
        ticks.spawn(async move { emitter.tick().await });
    }
    let mut delivered = 0;
    while let Some(report) = ticks.join_next().await {
        delivered += report.unwrap().success_count;
    }

    assert_eq!(delivered, 30);
    let received = harness.transport.received_event_ids();
    let unique: HashSet<_> = received.iter().copied().collect();
    assert_eq!(received.len(), unique.len(), "an event was sent twice");
    assert_eq!(unique, ids.into_iter().collect::<HashSet<_>>());
    assert_eq!(harness.stored().await, 0);
}

#[tokio::test]
async fn sends_bounded_by_thread_pool_size() {
    let harness = TestHarness::new(EmitterConfig {
        thread_pool_size: 4,
        ..Default::default()
    });
    harness
        .transport
        .set_default_response(MockResponse::DelayThenStatus(Duration::from_millis(20), 200));
    harness.submit_events(20).await;

    let report = harness.emitter.tick().await;

    assert_eq!(report.success_count, 20);
    assert!(harness.transport.peak_concurrency() <= 4);
    assert!(harness.transport.peak_concurrency() >= 2);
}

#[tokio::test]
async fn pool_size_update_applies_to_next_tick() {
    let harness = TestHarness::new(EmitterConfig {
        thread_pool_size: 8,
        ..Default::default()
    });
    harness
        .transport
        .set_default_response(MockResponse::DelayThenStatus(Duration::from_millis(5), 200));
    harness
        .emitter
        .update_config(EmitterConfigUpdate {
            thread_pool_size: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
    harness.submit_events(5).await;

    harness.emitter.tick().await;

    assert_eq!(harness.transport.peak_concurrency(), 1);
}

#[tokio::test]
async fn in_flight_events_not_selected_again() {
    let harness = TestHarness::new(EmitterConfig::default());
    harness
        .transport
        .set_default_response(MockResponse::DelayThenStatus(Duration::from_millis(100), 200));
    harness.submit_events(2).await;

    let emitter = harness.emitter.clone();
    let running = tokio::spawn(async move { emitter.tick().await });
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert!(harness.emitter.is_sending());
    assert_eq!(harness.emitter.state(), EmitterState::Ticking);
    assert_eq!(harness.in_flight().await, 2);
    assert!(harness.store.peek_oldest(10).await.unwrap().is_empty());

    let report = running.await.unwrap();
    assert_eq!(report.success_count, 2);
    assert!(!harness.emitter.is_sending());
    assert_eq!(harness.emitter.state(), EmitterState::Idle);
}

#[tokio::test]
async fn events_submitted_during_tick_wait_for_next() {
    let harness = TestHarness::new(EmitterConfig::default());
    harness
        .transport
        .set_default_response(MockResponse::DelayThenStatus(Duration::from_millis(50), 200));
    harness.submit_events(1).await;

    let emitter = harness.emitter.clone();
    let running = tokio::spawn(async move { emitter.tick().await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    let late = harness.submit_events(1).await;

    let first = running.await.unwrap();
    assert_eq!(first.success_count, 1);
    assert_eq!(harness.eligible_ids().await, late);

    let second = harness.emitter.tick().await;
    assert_eq!(second.requests[0].event_ids, late);
}
