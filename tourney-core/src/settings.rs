use serde::{Deserialize, Serialize};

use crate::backoff::Backoff;

/// Tunables for reconnects and write retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Channel enable attempts per platform "online" signal.
    pub max_reconnect_attempts: u32,
    pub reconnect_base_ms: u64,
    pub reconnect_cap_ms: u64,
    /// Retries after the first write attempt.
    pub write_max_retries: u32,
    pub write_base_ms: u64,
    pub write_cap_ms: u64,
    /// Also retry `resource-exhausted` failures.
    pub retry_resource_exhausted: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 5,
            reconnect_base_ms: 1000,
            reconnect_cap_ms: 30_000,
            write_max_retries: 3,
            write_base_ms: 1000,
            write_cap_ms: 10_000,
            retry_resource_exhausted: false,
        }
    }
}

impl SyncSettings {
    pub fn reconnect_backoff(&self) -> Backoff {
        Backoff::new(self.reconnect_base_ms, self.reconnect_cap_ms)
    }

    pub fn write_backoff(&self) -> Backoff {
        Backoff::new(self.write_base_ms, self.write_cap_ms)
    }
}
