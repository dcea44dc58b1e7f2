//! Bounded-concurrency request dispatch.
//!
//! A tick hands its requests to a [`Dispatcher`] sized from the config
//! snapshot. Each request takes a semaphore permit before it is spawned, so
//! at most `slots` sends run at once and submission waits while every slot
//! is busy. The first send that gets no response marks the dispatch offline:
//! requests still waiting for a slot are returned unsent, the ones already
//! running finish normally.

use emitter_transport::{Request, RequestOutcome, Transport};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Everything that happened to one tick's requests.
#[derive(Debug, Default)]
pub struct Dispatch {
    /// One outcome per request that was handed to the transport, in
    /// submission order.
    pub outcomes: Vec<RequestOutcome>,
    /// Requests never sent because the network looked down.
    pub unsent: Vec<Request>,
    /// A send got no response.
    pub offline: bool,
}

/// Worker pool of a fixed number of concurrent send slots.
pub struct Dispatcher {
    slots: usize,
}

impl Dispatcher {
    pub fn new(slots: usize) -> Self {
        Self {
            slots: slots.max(1),
        }
    }

    /// Send every request and wait for all of them to finish.
    pub async fn dispatch(&self, transport: Arc<dyn Transport>, requests: Vec<Request>) -> Dispatch {
        let semaphore = Arc::new(Semaphore::new(self.slots));
        let offline = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();
        let mut submitted: Vec<Request> = Vec::new();
        let mut unsent = Vec::new();

        let mut pending = requests.into_iter();
        while let Some(request) = pending.next() {
            if offline.load(Ordering::SeqCst) {
                unsent.push(request);
                unsent.extend(pending.by_ref());
                break;
            }

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    unsent.push(request);
                    continue;
                }
            };

            // A slot may have freed because a send just failed.
            if offline.load(Ordering::SeqCst) {
                unsent.push(request);
                unsent.extend(pending.by_ref());
                break;
            }

            let transport = transport.clone();
            let offline = offline.clone();
            let task_request = request.clone();
            tasks.spawn(async move {
                let outcome = transport.send(&task_request).await;
                if outcome.is_transport_failure() {
                    offline.store(true, Ordering::SeqCst);
                }
                drop(permit);
                outcome
            });
            debug!(request_id = %request.request_id, events = request.len(), "Request dispatched");
            submitted.push(request);
        }

        let mut finished: HashMap<Uuid, RequestOutcome> = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    finished.insert(outcome.request_id, outcome);
                }
                Err(e) => error!(error = %e, "Send task failed"),
            }
        }

        let outcomes = submitted
            .iter()
            .map(|request| {
                finished.remove(&request.request_id).unwrap_or_else(|| {
                    RequestOutcome::transport_failure(request, "send task did not complete")
                })
            })
            .collect();

        let offline = offline.load(Ordering::SeqCst);
        if offline && !unsent.is_empty() {
            warn!(unsent = unsent.len(), "Network unavailable, holding remaining requests");
        }

        Dispatch {
            outcomes,
            unsent,
            offline,
        }
    }
}
