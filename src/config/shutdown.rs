//! Shutdown sequence configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Shutdown sequence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownConfig {
    /// Prefix under which subsystems register their teardown callbacks
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    /// Seconds to wait for cleanup callbacks before exiting anyway (0 waits forever)
    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,

    /// Process exit status after the shutdown sequence
    #[serde(default = "default_exit_code")]
    pub exit_code: i32,
}

impl ShutdownConfig {
    /// `None` when the sequence should wait for callbacks unconditionally
    pub fn grace_period(&self) -> Option<Duration> {
        (self.grace_period_secs > 0).then(|| Duration::from_secs(self.grace_period_secs))
    }

    /// Topic for a subsystem's teardown, e.g. `shutdown:websocket`
    pub fn topic_for(&self, subsystem: &str) -> String {
        format!("{}{}", self.topic_prefix, subsystem)
    }

    /// Validate shutdown configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.topic_prefix.is_empty() {
            return Err(ValidationError::EmptyShutdownPrefix);
        }
        if self.topic_prefix.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidShutdownPrefix);
        }
        Ok(())
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            topic_prefix: default_topic_prefix(),
            grace_period_secs: default_grace_period(),
            exit_code: default_exit_code(),
        }
    }
}

fn default_topic_prefix() -> String {
    "shutdown:".to_string()
}

fn default_grace_period() -> u64 {
    30
}

fn default_exit_code() -> i32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_defaults() {
        let config = ShutdownConfig::default();
        assert_eq!(config.topic_prefix, "shutdown:");
        assert_eq!(config.exit_code, 1);
        assert_eq!(config.grace_period(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_zero_grace_period_waits_unconditionally() {
        let config = ShutdownConfig {
            grace_period_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.grace_period(), None);
    }

    #[test]
    fn test_topic_for_joins_prefix() {
        let config = ShutdownConfig::default();
        assert_eq!(config.topic_for("websocket"), "shutdown:websocket");
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let config = ShutdownConfig {
            topic_prefix: String::new(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::EmptyShutdownPrefix));
    }

    #[test]
    fn test_whitespace_prefix_rejected() {
        let config = ShutdownConfig {
            topic_prefix: "shut down:".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidShutdownPrefix));
    }
}
