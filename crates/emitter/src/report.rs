//! Per-tick delivery reports.

use crate::Disposition;
use event_store::EventId;
use serde::Serialize;
use uuid::Uuid;

/// Fate of one request within a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestReport {
    pub request_id: Uuid,
    pub event_ids: Vec<EventId>,
    pub succeeded: bool,
    /// `None` when no response was received or the request was never sent.
    pub status_code: Option<u16>,
    pub disposition: Disposition,
    /// False for oversized requests and requests held back while offline.
    pub sent: bool,
}

/// Summary published after every tick that pulled events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Events delivered.
    pub success_count: usize,
    /// Events not delivered: `retry_count + dropped_count`.
    pub failure_count: usize,
    /// Events removed without delivery (rejected or oversized).
    pub dropped_count: usize,
    /// Events released for a later tick.
    pub retry_count: usize,
    /// A send got no response; later requests were held back.
    pub offline: bool,
    /// Store failure during the tick, if any.
    pub store_error: Option<String>,
    pub requests: Vec<RequestReport>,
}

impl TickReport {
    /// True when the tick pulled nothing.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Number of events the tick accounted for.
    pub fn event_count(&self) -> usize {
        self.success_count + self.failure_count
    }

    pub(crate) fn record(&mut self, report: RequestReport) {
        let events = report.event_ids.len();
        match report.disposition {
            Disposition::Delivered => self.success_count += events,
            Disposition::Retryable => {
                self.failure_count += events;
                self.retry_count += events;
            }
            Disposition::NonRetryable => {
                self.failure_count += events;
                self.dropped_count += events;
            }
        }
        self.requests.push(report);
    }

    /// Fold a later tick into this one (used by drains).
    pub fn absorb(&mut self, other: TickReport) {
        self.success_count += other.success_count;
        self.failure_count += other.failure_count;
        self.dropped_count += other.dropped_count;
        self.retry_count += other.retry_count;
        self.offline |= other.offline;
        if other.store_error.is_some() {
            self.store_error = other.store_error;
        }
        self.requests.extend(other.requests);
    }
}
