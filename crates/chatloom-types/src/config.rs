//! Runtime tuning knobs.
//!
//! Deserialized from `config.toml` by the infra layer; every field has a
//! default so a missing or partial file still yields a working runtime.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-chat signal bus capacity.
const DEFAULT_BUS_CAPACITY: usize = 100;

/// Global direct-send queue capacity.
const DEFAULT_SEND_QUEUE_CAPACITY: usize = 1000;

/// Global broadcast queue capacity.
const DEFAULT_BROADCAST_QUEUE_CAPACITY: usize = 100;

/// Pacing between consecutive outbound sends; ~30 messages per second.
const DEFAULT_PACING_MS: u64 = 33;

/// State every new or abandoned chat starts from.
const DEFAULT_INITIAL_STATE: &str = "START";

/// Tuning parameters for the session runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Bounded capacity of each chat's signal bus.
    pub bus_capacity: usize,
    /// Capacity of the global direct-send queue.
    pub send_queue_capacity: usize,
    /// Capacity of the global broadcast queue.
    pub broadcast_queue_capacity: usize,
    /// Fixed delay between individual outbound sends, in milliseconds.
    pub pacing_ms: u64,
    /// Name of the initial state for fresh and reset chats.
    pub initial_state: String,
}

impl RuntimeConfig {
    /// Pacing interval as a `Duration`.
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bus_capacity: DEFAULT_BUS_CAPACITY,
            send_queue_capacity: DEFAULT_SEND_QUEUE_CAPACITY,
            broadcast_queue_capacity: DEFAULT_BROADCAST_QUEUE_CAPACITY,
            pacing_ms: DEFAULT_PACING_MS,
            initial_state: DEFAULT_INITIAL_STATE.to_string(),
        }
    }
}
