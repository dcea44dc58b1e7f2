//! Outbound requests and the transports that deliver them.
//!
//! A [`Request`] is one HTTP call to the collector carrying one or more
//! event payloads. A [`Transport`] sends exactly one request per call and
//! reports what happened as a [`RequestOutcome`]; it never retries on its
//! own. Retry decisions belong to the emitter.

mod error;
mod http;
mod outcome;
mod request;
mod transport;

pub use error::{TransportError, TransportResult};
pub use http::{HttpTransport, ACCEPT_CONTENT, ANONYMOUS_HEADER, POST_CONTENT_TYPE};
pub use outcome::RequestOutcome;
pub use request::{
    get_query_size, post_body_size, Request, PAYLOAD_DATA_SCHEMA, POST_ENVELOPE_OVERHEAD,
};
pub use transport::Transport;
