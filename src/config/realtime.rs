//! Realtime hub configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Realtime connection hub configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Start the hub at all. When false the upgrade endpoint answers 503.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Per-connection outbound queue size. A full queue evicts the connection.
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,

    /// Buffer of the hub's coordination channel
    #[serde(default = "default_command_capacity")]
    pub command_capacity: usize,

    /// Seconds between heartbeat pings sent to each client
    #[serde(default = "default_ping_period")]
    pub ping_period_secs: u64,

    /// Seconds a connection may stay silent before it is closed (0 disables)
    #[serde(default = "default_read_deadline")]
    pub read_deadline_secs: u64,

    /// Seconds a single write may take
    #[serde(default = "default_write_deadline")]
    pub write_deadline_secs: u64,

    /// Largest inbound message accepted, in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Consecutive failed heartbeats tolerated before closing
    #[serde(default = "default_heartbeat_fail_max")]
    pub heartbeat_fail_max: u32,

    /// Re-broadcast messages received from clients to every connection
    #[serde(default)]
    pub relay_inbound: bool,

    /// Send a `connected` message carrying the connection id on registration
    #[serde(default = "default_send_greeting")]
    pub send_greeting: bool,
}

impl RealtimeConfig {
    pub fn ping_period(&self) -> Duration {
        Duration::from_secs(self.ping_period_secs)
    }

    /// `None` when read deadlines are disabled
    pub fn read_deadline(&self) -> Option<Duration> {
        (self.read_deadline_secs > 0).then(|| Duration::from_secs(self.read_deadline_secs))
    }

    pub fn write_deadline(&self) -> Duration {
        Duration::from_secs(self.write_deadline_secs)
    }

    /// Validate realtime configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.outbound_capacity == 0 {
            return Err(ValidationError::ZeroCapacity("outbound_capacity"));
        }
        if self.command_capacity == 0 {
            return Err(ValidationError::ZeroCapacity("command_capacity"));
        }
        if self.max_message_size == 0 {
            return Err(ValidationError::ZeroCapacity("max_message_size"));
        }
        if self.heartbeat_fail_max == 0 {
            return Err(ValidationError::ZeroCapacity("heartbeat_fail_max"));
        }
        if self.ping_period_secs == 0 {
            return Err(ValidationError::ZeroInterval("ping_period_secs"));
        }
        if self.write_deadline_secs == 0 {
            return Err(ValidationError::ZeroInterval("write_deadline_secs"));
        }
        Ok(())
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            outbound_capacity: default_outbound_capacity(),
            command_capacity: default_command_capacity(),
            ping_period_secs: default_ping_period(),
            read_deadline_secs: default_read_deadline(),
            write_deadline_secs: default_write_deadline(),
            max_message_size: default_max_message_size(),
            heartbeat_fail_max: default_heartbeat_fail_max(),
            relay_inbound: false,
            send_greeting: default_send_greeting(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_outbound_capacity() -> usize {
    64
}

fn default_command_capacity() -> usize {
    1024
}

fn default_ping_period() -> u64 {
    20
}

fn default_read_deadline() -> u64 {
    60
}

fn default_write_deadline() -> u64 {
    10
}

fn default_max_message_size() -> usize {
    65_536
}

fn default_heartbeat_fail_max() -> u32 {
    4
}

fn default_send_greeting() -> bool {
    true
}
