//! Outbound collector requests.

use emitter_config::HttpMethod;
use event_store::{EventId, Payload};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Self-describing schema wrapping a POST body.
pub const PAYLOAD_DATA_SCHEMA: &str =
    "iglu:com.snowplowanalytics.snowplow/payload_data/jsonschema/1-0-4";

const ENVELOPE_HEAD: &str = r#"{"schema":""#;
const ENVELOPE_MID: &str = r#"","data":["#;
const ENVELOPE_TAIL: &str = "]}";

/// Bytes a POST body spends on its envelope, excluding payloads and commas.
pub const POST_ENVELOPE_OVERHEAD: usize =
    ENVELOPE_HEAD.len() + PAYLOAD_DATA_SCHEMA.len() + ENVELOPE_MID.len() + ENVELOPE_TAIL.len();

/// Exact POST body size for `count` payloads totalling `payload_bytes`.
pub fn post_body_size(payload_bytes: usize, count: usize) -> usize {
    POST_ENVELOPE_OVERHEAD + payload_bytes + count.saturating_sub(1)
}

/// Length of the GET query string carrying `payload`.
pub fn get_query_size(payload: &Payload) -> usize {
    encode_query(payload).len()
}

fn encode_query(payload: &Payload) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in payload.as_map() {
        match value {
            Value::String(s) => query.append_pair(key, s),
            other => query.append_pair(key, &other.to_string()),
        };
    }
    query.finish()
}

#[derive(Serialize)]
struct Envelope<'a> {
    schema: &'static str,
    data: &'a [Payload],
}

/// One HTTP call to the collector.
///
/// GET requests always carry exactly one payload. POST requests carry one or
/// more, wrapped in the `payload_data` envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub request_id: Uuid,
    pub method: HttpMethod,
    pub payloads: Vec<Payload>,
    pub event_ids: Vec<EventId>,
    /// Too large to send even alone; never handed to a transport.
    pub oversize: bool,
    /// Ask the collector to anonymise (`SP-Anonymous`).
    pub anonymous: bool,
}

impl Request {
    /// Build a request from `(id, payload)` pairs, preserving their order.
    pub fn new(method: HttpMethod, events: Vec<(EventId, Payload)>) -> Self {
        let (event_ids, payloads) = events.into_iter().unzip();
        Self {
            request_id: Uuid::new_v4(),
            method,
            payloads,
            event_ids,
            oversize: false,
            anonymous: false,
        }
    }

    pub fn with_oversize(mut self, oversize: bool) -> Self {
        self.oversize = oversize;
        self
    }

    pub fn with_anonymous(mut self, anonymous: bool) -> Self {
        self.anonymous = anonymous;
        self
    }

    pub fn len(&self) -> usize {
        self.event_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.event_ids.is_empty()
    }

    /// JSON body for a POST request.
    pub fn post_body(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&Envelope {
            schema: PAYLOAD_DATA_SCHEMA,
            data: &self.payloads,
        })
    }

    /// URL-encoded query for a GET request (first payload only).
    pub fn get_query(&self) -> String {
        self.payloads.first().map(encode_query).unwrap_or_default()
    }

    /// Bytes this request puts on the wire as body or query string.
    pub fn byte_size(&self) -> usize {
        match self.method {
            HttpMethod::Get => self.get_query().len(),
            HttpMethod::Post => post_body_size(
                self.payloads.iter().map(Payload::byte_size).sum(),
                self.payloads.len(),
            ),
        }
    }
}
