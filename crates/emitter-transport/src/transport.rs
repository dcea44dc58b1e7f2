//! Transport plugin contract.

use crate::{Request, RequestOutcome};
use async_trait::async_trait;
use emitter_config::HttpMethod;

/// Sends one request and reports the outcome.
///
/// Implementations must not retry and must enforce their own network
/// timeout; a timeout is reported as a transport failure.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Method requests should be assembled for.
    fn method(&self) -> HttpMethod;

    async fn send(&self, request: &Request) -> RequestOutcome;
}
