//! Retry classification.

use emitter_transport::RequestOutcome;
use serde::Serialize;
use std::collections::BTreeMap;

/// What happens to the events of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Acknowledged by the collector; remove.
    Delivered,
    /// Put back for a later tick.
    Retryable,
    /// Can never succeed as sent; remove and report as dropped.
    NonRetryable,
}

impl Disposition {
    /// Whether the events leave the queue.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Disposition::Retryable)
    }
}

/// Classify a response status.
///
/// 2xx is always delivered. For anything else the override map wins; without
/// an override, 4xx other than 408 and 429 is permanent and every other code
/// is worth retrying.
pub fn classify_status(status: u16, overrides: &BTreeMap<u16, bool>) -> Disposition {
    if (200..300).contains(&status) {
        return Disposition::Delivered;
    }
    if let Some(&retry) = overrides.get(&status) {
        return if retry {
            Disposition::Retryable
        } else {
            Disposition::NonRetryable
        };
    }
    match status {
        408 | 429 => Disposition::Retryable,
        400..=499 => Disposition::NonRetryable,
        _ => Disposition::Retryable,
    }
}

/// Classify a request outcome. No response means retry.
pub fn classify(outcome: &RequestOutcome, overrides: &BTreeMap<u16, bool>) -> Disposition {
    match outcome.status_code {
        Some(status) => classify_status(status, overrides),
        None => Disposition::Retryable,
    }
}
