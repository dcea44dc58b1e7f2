//! The delivery orchestrator.
//!
//! One tick pulls up to `emit_range` events, assembles them into requests,
//! dispatches them with bounded concurrency, classifies every outcome and
//! settles the store: delivered and rejected events are removed, everything
//! else is released for a later tick. Ticks are serialized on a mutex, so
//! concurrent triggers queue up instead of racing for the same events.
//!
//! ```text
//! submit ──▶ store ──peek──▶ assemble ──▶ dispatch ──▶ classify ──▶ settle
//!              ▲                                                    │
//!              └────────────── release (retryable) ◀────────────────┘
//! ```

use crate::assembler::assemble;
use crate::dispatcher::Dispatcher;
use crate::retry::{classify, Disposition};
use crate::{EmitterError, EmitterResult, RequestReport, TickReport};
use chrono::Utc;
use emitter_config::{EmitterConfig, EmitterConfigUpdate};
use emitter_transport::Transport;
use event_store::{EventId, EventStore, Payload, StoreError};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Observable emitter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmitterState {
    Idle,
    Ticking,
    Paused,
}

struct Worker {
    handle: JoinHandle<()>,
    stop: watch::Sender<bool>,
}

struct Inner {
    store: Arc<dyn EventStore>,
    transport: Arc<dyn Transport>,
    config: RwLock<EmitterConfig>,
    /// Held for the whole of a tick.
    tick_lock: Mutex<()>,
    paused: AtomicBool,
    ticking: AtomicBool,
    /// New events or an explicit flush request for the background loop.
    wake: Notify,
    reports: broadcast::Sender<TickReport>,
    worker: Mutex<Option<Worker>>,
    worker_running: AtomicBool,
}

/// Cheaply cloneable handle to one emitter.
///
/// A started emitter keeps itself alive until [`Emitter::shutdown`].
#[derive(Clone)]
pub struct Emitter {
    inner: Arc<Inner>,
}

impl Emitter {
    pub(crate) fn new(
        store: Arc<dyn EventStore>,
        transport: Arc<dyn Transport>,
        config: EmitterConfig,
        report_capacity: usize,
    ) -> Self {
        let (reports, _) = broadcast::channel(report_capacity);
        Self {
            inner: Arc::new(Inner {
                store,
                transport,
                config: RwLock::new(config),
                tick_lock: Mutex::new(()),
                paused: AtomicBool::new(false),
                ticking: AtomicBool::new(false),
                wake: Notify::new(),
                reports,
                worker: Mutex::new(None),
                worker_running: AtomicBool::new(false),
            }),
        }
    }

    /// Queue an event for delivery.
    ///
    /// Fails with [`EmitterError::StoreFull`] when the store is at capacity;
    /// the event is then not stored and the caller decides what to do.
    pub async fn submit(&self, payload: Payload) -> EmitterResult<EventId> {
        let id = self.inner.store.enqueue(payload).await.map_err(|e| {
            if let StoreError::Full { capacity } = &e {
                warn!(capacity, "Event store full, event refused");
            }
            EmitterError::from(e)
        })?;
        self.inner.wake.notify_one();
        Ok(id)
    }

    /// Run one delivery cycle and return its report.
    ///
    /// Waits for any tick already running. Does nothing while paused. The
    /// config is read once at the start, so updates apply from the next tick.
    pub async fn tick(&self) -> TickReport {
        let _guard = self.inner.tick_lock.lock().await;
        if self.is_paused() {
            debug!("Emitter paused, skipping tick");
            return TickReport::default();
        }

        let config = self.inner.config.read().await.clone();
        self.inner.ticking.store(true, Ordering::SeqCst);
        let report = self.run_tick(&config).await;
        self.inner.ticking.store(false, Ordering::SeqCst);

        if !report.is_empty() || report.store_error.is_some() {
            info!(
                events = report.event_count(),
                success = report.success_count,
                failure = report.failure_count,
                dropped = report.dropped_count,
                retry = report.retry_count,
                offline = report.offline,
                "Tick complete"
            );
            // No subscribers is fine.
            let _ = self.inner.reports.send(report.clone());
        }
        report
    }

    /// Tick repeatedly until the queue is drained.
    ///
    /// Stops when a tick pulls nothing, goes offline, hits a store error, or
    /// delivers nothing while some events had to be retried, and when paused.
    /// Returns the combined report.
    pub async fn flush_now(&self) -> TickReport {
        self.drain(None).await
    }

    async fn drain(&self, stop: Option<&watch::Receiver<bool>>) -> TickReport {
        let mut total = TickReport::default();
        loop {
            if self.is_paused() || stop.is_some_and(|rx| *rx.borrow()) {
                break;
            }
            let report = self.tick().await;
            let done = report.is_empty()
                || report.offline
                || report.store_error.is_some()
                || (report.success_count == 0 && report.retry_count > 0);
            total.absorb(report);
            if done {
                break;
            }
        }
        total
    }

    async fn run_tick(&self, config: &EmitterConfig) -> TickReport {
        let mut report = TickReport::default();

        let events = match self.inner.store.peek_oldest(config.emit_range).await {
            Ok(events) => events,
            Err(e) => {
                error!(error = %e, "Failed to read events from store");
                report.store_error = Some(e.to_string());
                return report;
            }
        };
        if events.is_empty() {
            return report;
        }

        let method = self.inner.transport.method();
        let assembly = assemble(&events, config, method, Utc::now().timestamp_millis());
        debug!(
            events = events.len(),
            requests = assembly.requests.len(),
            oversized = assembly.oversized.len(),
            method = %method,
            "Assembled batch"
        );

        let dispatch = Dispatcher::new(config.thread_pool_size)
            .dispatch(self.inner.transport.clone(), assembly.requests)
            .await;

        let mut remove: Vec<EventId> = Vec::new();
        let mut release: Vec<EventId> = Vec::new();

        for outcome in dispatch.outcomes {
            let disposition = classify(&outcome, &config.custom_retry_for_status_codes);
            if disposition == Disposition::NonRetryable {
                warn!(
                    request_id = %outcome.request_id,
                    status = ?outcome.status_code,
                    events = ?outcome.event_ids,
                    "Collector rejected events, dropping"
                );
            }
            if disposition.is_terminal() {
                remove.extend(&outcome.event_ids);
            } else {
                release.extend(&outcome.event_ids);
            }
            report.record(RequestReport {
                request_id: outcome.request_id,
                succeeded: disposition == Disposition::Delivered,
                status_code: outcome.status_code,
                disposition,
                sent: true,
                event_ids: outcome.event_ids,
            });
        }

        for request in dispatch.unsent {
            release.extend(&request.event_ids);
            report.record(RequestReport {
                request_id: request.request_id,
                event_ids: request.event_ids,
                succeeded: false,
                status_code: None,
                disposition: Disposition::Retryable,
                sent: false,
            });
        }

        for request in assembly.oversized {
            warn!(
                events = ?request.event_ids,
                bytes = request.byte_size(),
                "Event exceeds byte limit, dropping"
            );
            remove.extend(&request.event_ids);
            report.record(RequestReport {
                request_id: request.request_id,
                event_ids: request.event_ids,
                succeeded: false,
                status_code: None,
                disposition: Disposition::NonRetryable,
                sent: false,
            });
        }

        report.offline = dispatch.offline;
        if report.offline {
            warn!(retry = report.retry_count, "Collector unreachable, tick aborted");
        }

        self.settle(remove, release, &mut report).await;
        report
    }

    /// Apply dispositions to the store.
    async fn settle(
        &self,
        remove: Vec<EventId>,
        mut release: Vec<EventId>,
        report: &mut TickReport,
    ) {
        if !remove.is_empty() {
            if let Err(e) = self.inner.store.remove(&remove).await {
                error!(error = %e, count = remove.len(), "Failed to remove settled events");
                report.store_error = Some(e.to_string());
                // Still stored: make them eligible again rather than stuck in flight.
                release.extend(remove);
            }
        }
        if !release.is_empty() {
            if let Err(e) = self.inner.store.release(&release).await {
                error!(error = %e, count = release.len(), "Failed to release events");
                report.store_error = Some(e.to_string());
            }
        }
    }

    /// Stop pulling events. A tick already running completes normally.
    pub fn pause(&self) {
        if !self.inner.paused.swap(true, Ordering::SeqCst) {
            info!("Emitter paused");
        }
    }

    /// Resume after [`Emitter::pause`] and flush what queued up meanwhile.
    pub fn resume(&self) {
        if self.inner.paused.swap(false, Ordering::SeqCst) {
            info!("Emitter resumed");
        }
        self.request_flush();
    }

    /// Ask for a drain without waiting for it.
    ///
    /// Wakes the background loop when started; otherwise spawns a one-off
    /// drain on the current runtime (if any).
    pub fn request_flush(&self) {
        if self.inner.worker_running.load(Ordering::SeqCst) {
            self.inner.wake.notify_one();
        } else if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let emitter = self.clone();
            runtime.spawn(async move {
                emitter.flush_now().await;
            });
        }
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    /// True while a tick is running.
    pub fn is_sending(&self) -> bool {
        self.inner.ticking.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> EmitterState {
        if self.is_sending() {
            EmitterState::Ticking
        } else if self.is_paused() {
            EmitterState::Paused
        } else {
            EmitterState::Idle
        }
    }

    /// Events currently stored, in flight or not.
    pub async fn queued_count(&self) -> EmitterResult<usize> {
        Ok(self.inner.store.count().await?)
    }

    /// Snapshot of the active configuration.
    pub async fn current_config(&self) -> EmitterConfig {
        self.inner.config.read().await.clone()
    }

    /// Apply a partial update. Takes effect from the next tick; a tick in
    /// progress keeps the snapshot it started with.
    pub async fn update_config(&self, update: EmitterConfigUpdate) -> EmitterResult<EmitterConfig> {
        let mut config = self.inner.config.write().await;
        let next = update.apply(&config);
        next.validate()?;
        if next != *config {
            info!(
                buffer_option = ?next.buffer_option,
                emit_range = next.emit_range,
                thread_pool_size = next.thread_pool_size,
                "Emitter config updated"
            );
        }
        *config = next.clone();
        Ok(next)
    }

    /// Receive a [`TickReport`] after every tick that pulled events.
    pub fn subscribe(&self) -> broadcast::Receiver<TickReport> {
        self.inner.reports.subscribe()
    }

    /// Start the background loop: drain on every `interval`, on every
    /// submit and on every flush request.
    pub async fn start(&self, interval: Duration) -> EmitterResult<()> {
        let mut worker = self.inner.worker.lock().await;
        if worker.is_some() {
            return Err(EmitterError::AlreadyStarted);
        }

        let (stop, mut stop_rx) = watch::channel(false);
        let period = interval.max(Duration::from_millis(1));
        let emitter = self.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {}
                    _ = emitter.inner.wake.notified() => {}
                }

                if emitter.is_paused() {
                    continue;
                }
                emitter.drain(Some(&stop_rx)).await;
            }
            debug!("Emitter loop stopped");
        });

        self.inner.worker_running.store(true, Ordering::SeqCst);
        *worker = Some(Worker { handle, stop });
        info!(interval_ms = period.as_millis() as u64, "Emitter started");
        Ok(())
    }

    /// Stop the background loop, letting a running tick finish.
    pub async fn shutdown(&self) {
        let worker = self.inner.worker.lock().await.take();
        if let Some(worker) = worker {
            let _ = worker.stop.send(true);
            if let Err(e) = worker.handle.await {
                warn!(error = %e, "Emitter loop ended abnormally");
            }
            self.inner.worker_running.store(false, Ordering::SeqCst);
            info!("Emitter stopped");
        }
    }
}
