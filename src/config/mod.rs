//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `PORTAL` prefix and nested values use double underscores as separators.
//! Every section has defaults, so an empty environment is a valid configuration.
//!
//! # Example
//!
//! ```no_run
//! use portal_core::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Hub enabled: {}", config.realtime.enabled);
//! ```

mod error;
mod features;
mod realtime;
mod server;
mod shutdown;

pub use error::{ConfigError, ValidationError};
pub use features::FeatureFlags;
pub use realtime::RealtimeConfig;
pub use server::{Environment, ServerConfig};
pub use shutdown::ShutdownConfig;

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// Realtime connection hub
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Shutdown sequence
    #[serde(default)]
    pub shutdown: ShutdownConfig,

    /// Feature flags
    #[serde(default)]
    pub features: FeatureFlags,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `PORTAL` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `PORTAL__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `PORTAL__REALTIME__ENABLED=false` -> `realtime.enabled = false`
    /// - `PORTAL__SHUTDOWN__TOPIC_PREFIX=destroy:` -> `shutdown.topic_prefix = "destroy:"`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("PORTAL")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.realtime.validate()?;
        self.shutdown.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Helper to clear environment variables after testing
    fn clear_env() {
        env::remove_var("PORTAL__SERVER__PORT");
        env::remove_var("PORTAL__SERVER__ENVIRONMENT");
        env::remove_var("PORTAL__REALTIME__ENABLED");
        env::remove_var("PORTAL__REALTIME__OUTBOUND_CAPACITY");
        env::remove_var("PORTAL__SHUTDOWN__TOPIC_PREFIX");
    }

    #[test]
    fn test_load_with_empty_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let result = AppConfig::load();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert!(config.realtime.enabled);
        assert_eq!(config.shutdown.topic_prefix, "shutdown:");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let config = AppConfig::load().unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, Environment::Development);
    }

    #[test]
    fn test_production_environment_from_env() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("PORTAL__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.environment, Environment::Production);
    }

    #[test]
    fn test_custom_server_port() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("PORTAL__SERVER__PORT", "3000");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_realtime_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("PORTAL__REALTIME__ENABLED", "false");
        env::set_var("PORTAL__REALTIME__OUTBOUND_CAPACITY", "8");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(!config.realtime.enabled);
        assert_eq!(config.realtime.outbound_capacity, 8);
    }

    #[test]
    fn test_shutdown_prefix_override() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("PORTAL__SHUTDOWN__TOPIC_PREFIX", "destroy:");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.shutdown.topic_prefix, "destroy:");
    }

    #[test]
    fn test_validate_rejects_bad_section() {
        let mut config = AppConfig::default();
        config.realtime.command_capacity = 0;
        assert_eq!(
            config.validate(),
            Err(ValidationError::ZeroCapacity("command_capacity"))
        );
    }
}
