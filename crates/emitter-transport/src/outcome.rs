//! What happened to one request.

use crate::Request;
use event_store::EventId;
use uuid::Uuid;

/// Result of sending one [`Request`].
///
/// `status_code` is `None` when no response arrived (connection refused,
/// DNS failure, timeout).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOutcome {
    pub request_id: Uuid,
    pub event_ids: Vec<EventId>,
    pub status_code: Option<u16>,
    pub error: Option<String>,
}

impl RequestOutcome {
    /// The collector answered with `status`.
    pub fn from_status(request: &Request, status: u16) -> Self {
        Self {
            request_id: request.request_id,
            event_ids: request.event_ids.clone(),
            status_code: Some(status),
            error: None,
        }
    }

    /// No response was received.
    pub fn transport_failure(request: &Request, error: impl Into<String>) -> Self {
        Self {
            request_id: request.request_id,
            event_ids: request.event_ids.clone(),
            status_code: None,
            error: Some(error.into()),
        }
    }

    /// 2xx response.
    pub fn succeeded(&self) -> bool {
        matches!(self.status_code, Some(code) if (200..300).contains(&code))
    }

    pub fn is_transport_failure(&self) -> bool {
        self.status_code.is_none()
    }
}
