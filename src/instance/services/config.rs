//! Supervisor tunables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeouts and limits applied by the supervisor and its instances.
///
/// Durations are read and written as milliseconds, e.g. `stop_timeout_ms:
/// 5000`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Upper bound on waiting for an instance to acknowledge a stop.
    #[serde(rename = "stop_timeout_ms", with = "duration_ms")]
    pub stop_timeout: Duration,
    /// Upper bound on waiting for an instance to acknowledge a reload.
    #[serde(rename = "control_ack_timeout_ms", with = "duration_ms")]
    pub control_ack_timeout: Duration,
    /// Upper bound an instance spends closing its connection.
    #[serde(rename = "graceful_close_timeout_ms", with = "duration_ms")]
    pub graceful_close_timeout: Duration,
    /// Minimum token length accepted by `start`.
    pub min_token_length: usize,
    /// First delay before reconnecting a dropped connection.
    #[serde(rename = "reconnect_initial_ms", with = "duration_ms")]
    pub reconnect_initial: Duration,
    /// Ceiling for the doubling reconnect delay.
    #[serde(rename = "reconnect_max_ms", with = "duration_ms")]
    pub reconnect_max: Duration,
    /// Capacity of each instance's control channel.
    pub control_buffer: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            stop_timeout: Duration::from_secs(5),
            control_ack_timeout: Duration::from_secs(5),
            graceful_close_timeout: Duration::from_secs(3),
            min_token_length: 10,
            reconnect_initial: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(30),
            control_buffer: 16,
        }
    }
}

impl SupervisorConfig {
    /// Returns the reconnect delay that follows `current`.
    #[must_use]
    pub fn next_backoff(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.reconnect_max)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
