//! Link configuration.

use std::time::Duration;

use mcc_protocol::MAX_FRAME_SIZE;
use serde::{Deserialize, Serialize};

/// Tunables for a [`Link`](crate::Link) and its [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Per-response timeout in milliseconds.
    pub response_timeout_ms: u64,
    /// Name sent in `AppStart`.
    pub app_name: String,
    /// Protocol version sent in `AppStart`.
    pub app_version: u8,
    /// Capacity of the lifecycle/push event channel.
    pub event_capacity: usize,
    /// Read buffer size for stream transports.
    pub read_buffer_size: usize,
    /// Largest inbound payload a stream transport accepts. Longer length
    /// headers are treated as corruption and skipped.
    pub max_frame_size: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            response_timeout_ms: 5000,
            app_name: "MCC".to_string(),
            app_version: 1,
            event_capacity: 64,
            read_buffer_size: 1024,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

impl LinkConfig {
    /// Per-response timeout.
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}
