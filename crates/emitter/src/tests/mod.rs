//! Integration tests for the emitter.
//!
//! - `harness.rs`     - MockTransport with scripted responses, TestHarness
//! - `delivery.rs`    - Batching into requests and removal on success
//! - `retry_policy.rs` - Status classification and what happens to the events
//! - `offline.rs`     - No response: tick aborts, events come back
//! - `concurrency.rs` - Serialized ticks, slot limit, no duplicate in-flight events
//! - `control.rs`     - Pause/resume, state, config hot-swap, background loop
//! - `invariants.rs`  - No silent loss, capacity, byte limits end to end
//! - `durability.rs`  - SQLite-backed emitter across restarts

mod concurrency;
mod durability;

#[allow(unused_imports)]
pub use harness::{MockResponse, MockTransport, TestHarness};
