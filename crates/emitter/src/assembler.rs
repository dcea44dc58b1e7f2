//! Batch assembly: turns a pulled batch of events into outbound requests.
//!
//! Packing is strictly in queue order. POST requests are filled greedily
//! until either the byte limit or the buffer option's group size would be
//! exceeded. GET requests always carry one event. An event that does not
//! fit even alone is isolated and flagged oversize; it is never sent.

use emitter_config::{BufferOption, EmitterConfig, HttpMethod};
use emitter_transport::{get_query_size, post_body_size, Request};
use event_store::{EventId, Payload, QueuedEvent};

/// Payload key carrying the time the request was built, in epoch ms.
pub const SENT_TIMESTAMP_KEY: &str = "stm";

/// Requests built from one batch.
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    /// Requests to hand to the dispatcher, in queue order.
    pub requests: Vec<Request>,
    /// Single-event requests too large to send.
    pub oversized: Vec<Request>,
}

impl Assembly {
    /// Event ids grouped per sendable request.
    pub fn groupings(&self) -> Vec<Vec<EventId>> {
        self.requests.iter().map(|r| r.event_ids.clone()).collect()
    }
}

/// Build requests for `events`.
///
/// `sent_at_ms` is stamped on every payload before any size check so the
/// limits apply to what goes on the wire. Same input, same groupings.
pub fn assemble(
    events: &[QueuedEvent],
    config: &EmitterConfig,
    method: HttpMethod,
    sent_at_ms: i64,
) -> Assembly {
    let stamped = events.iter().map(|event| {
        let payload = event
            .payload
            .clone()
            .with(SENT_TIMESTAMP_KEY, sent_at_ms.to_string());
        (event.id, payload)
    });

    let mut assembly = match method {
        HttpMethod::Get => assemble_single(stamped, method, config),
        HttpMethod::Post if config.buffer_option == BufferOption::Single => {
            assemble_single(stamped, method, config)
        }
        HttpMethod::Post => assemble_grouped(stamped, config),
    };

    for request in assembly
        .requests
        .iter_mut()
        .chain(assembly.oversized.iter_mut())
    {
        request.anonymous = config.server_anonymisation;
    }
    assembly
}

fn assemble_single(
    events: impl Iterator<Item = (EventId, Payload)>,
    method: HttpMethod,
    config: &EmitterConfig,
) -> Assembly {
    let mut assembly = Assembly::default();
    for (id, payload) in events {
        let oversize = match method {
            HttpMethod::Get => get_query_size(&payload) > config.byte_limit_get,
            HttpMethod::Post => post_body_size(payload.byte_size(), 1) > config.byte_limit_post,
        };
        let request = Request::new(method, vec![(id, payload)]).with_oversize(oversize);
        if oversize {
            assembly.oversized.push(request);
        } else {
            assembly.requests.push(request);
        }
    }
    assembly
}

fn assemble_grouped(
    events: impl Iterator<Item = (EventId, Payload)>,
    config: &EmitterConfig,
) -> Assembly {
    let limit = config.byte_limit_post;
    let group_size = config.buffer_option.group_size();

    let mut assembly = Assembly::default();
    let mut current: Vec<(EventId, Payload)> = Vec::new();
    let mut current_bytes = 0;

    for (id, payload) in events {
        let size = payload.byte_size();

        if post_body_size(size, 1) > limit {
            assembly
                .oversized
                .push(Request::new(HttpMethod::Post, vec![(id, payload)]).with_oversize(true));
            continue;
        }

        let full = current.len() >= group_size
            || post_body_size(current_bytes + size, current.len() + 1) > limit;
        if !current.is_empty() && full {
            assembly
                .requests
                .push(Request::new(HttpMethod::Post, std::mem::take(&mut current)));
            current_bytes = 0;
        }

        current.push((id, payload));
        current_bytes += size;
    }

    if !current.is_empty() {
        assembly.requests.push(Request::new(HttpMethod::Post, current));
    }
    assembly
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const SENT_AT: i64 = 1_700_000_000_000;

    fn events(sizes: &[usize]) -> Vec<QueuedEvent> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, &pad)| QueuedEvent {
                id: i as EventId + 1,
                payload: Payload::new().with("e", "pv").with("pad", "x".repeat(pad)),
                enqueued_at: Utc::now(),
            })
            .collect()
    }

    fn grouped(option: BufferOption, limit: usize) -> EmitterConfig {
        EmitterConfig {
            buffer_option: option,
            byte_limit_post: limit,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_group_splits_twelve_into_ten_and_two() {
        let batch = events(&[10; 12]);
        let assembly = assemble(
            &batch,
            &grouped(BufferOption::DefaultGroup, 40_000),
            HttpMethod::Post,
            SENT_AT,
        );

        let groups = assembly.groupings();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], (1..=10).collect::<Vec<_>>());
        assert_eq!(groups[1], vec![11, 12]);
        assert!(assembly.oversized.is_empty());
    }

    #[test]
    fn test_large_group_caps_at_twenty_five() {
        let batch = events(&[5; 60]);
        let assembly = assemble(
            &batch,
            &grouped(BufferOption::LargeGroup, 40_000),
            HttpMethod::Post,
            SENT_AT,
        );
        let sizes: Vec<_> = assembly.requests.iter().map(Request::len).collect();
        assert_eq!(sizes, vec![25, 25, 10]);
    }

    #[test]
    fn test_byte_limit_closes_request() {
        let batch = events(&[300; 6]);
        // Room for two stamped events per body, not three.
        let one = assemble(
            &batch[..1],
            &grouped(BufferOption::LargeGroup, 100_000),
            HttpMethod::Post,
            SENT_AT,
        );
        let limit = one.requests[0].byte_size() * 2;

        let assembly = assemble(
            &batch,
            &grouped(BufferOption::LargeGroup, limit),
            HttpMethod::Post,
            SENT_AT,
        );

        assert_eq!(assembly.groupings(), vec![vec![1, 2], vec![3, 4], vec![5, 6]]);
        for request in &assembly.requests {
            assert!(request.byte_size() <= limit);
            assert_eq!(request.post_body().unwrap().len(), request.byte_size());
        }
    }

    #[test]
    fn test_oversized_post_event_isolated() {
        let batch = events(&[10, 5_000, 10]);
        let assembly = assemble(
            &batch,
            &grouped(BufferOption::DefaultGroup, 1_000),
            HttpMethod::Post,
            SENT_AT,
        );

        assert_eq!(assembly.groupings(), vec![vec![1, 3]]);
        assert_eq!(assembly.oversized.len(), 1);
        assert_eq!(assembly.oversized[0].event_ids, vec![2]);
        assert!(assembly.oversized[0].oversize);
    }

    #[test]
    fn test_get_is_never_grouped() {
        let batch = events(&[10; 4]);
        let config = EmitterConfig {
            buffer_option: BufferOption::LargeGroup,
            ..Default::default()
        };
        let assembly = assemble(&batch, &config, HttpMethod::Get, SENT_AT);

        assert_eq!(assembly.requests.len(), 4);
        assert!(assembly
            .requests
            .iter()
            .all(|r| r.len() == 1 && r.method == HttpMethod::Get));
    }

    #[test]
    fn test_get_oversize_uses_get_limit() {
        let batch = events(&[10, 500]);
        let config = EmitterConfig {
            byte_limit_get: 200,
            byte_limit_post: 10,
            ..Default::default()
        };
        let assembly = assemble(&batch, &config, HttpMethod::Get, SENT_AT);

        assert_eq!(assembly.groupings(), vec![vec![1]]);
        assert_eq!(assembly.oversized[0].event_ids, vec![2]);
        assert!(assembly.requests[0].byte_size() <= 200);
    }

    #[test]
    fn test_single_post_one_event_per_request() {
        let batch = events(&[10; 3]);
        let assembly = assemble(
            &batch,
            &grouped(BufferOption::Single, 40_000),
            HttpMethod::Post,
            SENT_AT,
        );
        assert_eq!(assembly.groupings(), vec![vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn test_sent_timestamp_counts_toward_limit() {
        let batch = events(&[50]);
        let bare = post_body_size(batch[0].payload.byte_size(), 1);
        // Fits without the stamp, not with it.
        let assembly = assemble(
            &batch,
            &grouped(BufferOption::DefaultGroup, bare),
            HttpMethod::Post,
            SENT_AT,
        );
        assert!(assembly.requests.is_empty());
        assert_eq!(assembly.oversized.len(), 1);

        let stamped = &assembly.oversized[0].payloads[0];
        assert_eq!(
            stamped.get(SENT_TIMESTAMP_KEY),
            Some(&serde_json::json!(SENT_AT.to_string()))
        );
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let batch = events(&[40, 900, 15, 300, 300, 2_000, 7]);
        let config = grouped(BufferOption::DefaultGroup, 1_500);

        let first = assemble(&batch, &config, HttpMethod::Post, SENT_AT);
        let second = assemble(&batch, &config, HttpMethod::Post, SENT_AT);

        assert_eq!(first.groupings(), second.groupings());
        let oversized = |a: &Assembly| -> Vec<_> {
            a.oversized.iter().map(|r| r.event_ids.clone()).collect()
        };
        assert_eq!(oversized(&first), oversized(&second));
    }

    #[test]
    fn test_anonymous_flag_follows_config() {
        let batch = events(&[10, 10]);
        let config = EmitterConfig {
            server_anonymisation: true,
            ..grouped(BufferOption::DefaultGroup, 40_000)
        };
        let assembly = assemble(&batch, &config, HttpMethod::Post, SENT_AT);
        assert!(assembly.requests.iter().all(|r| r.anonymous));
    }

    #[test]
    fn test_input_payloads_untouched() {
        let batch = events(&[10]);
        let before = batch[0].payload.clone();
        assemble(&batch, &EmitterConfig::default(), HttpMethod::Post, SENT_AT);
        assert_eq!(batch[0].payload, before);
        assert!(batch[0].payload.get(SENT_TIMESTAMP_KEY).is_none());
    }
}
