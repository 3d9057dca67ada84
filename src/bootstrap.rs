//! Application context - explicit wiring of the shared subsystems.
//!
//! Startup order:
//! 1. Validate configuration
//! 2. Create the event manager
//! 3. Start the connection hub (if enabled) and register its teardown
//!    under `<shutdown prefix>websocket`
//!
//! Everything downstream receives what it needs from [`AppContext`]; there
//! are no process-wide singletons.

use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::adapters::http::build_router;
use crate::adapters::shutdown::{ShutdownError, ShutdownSettings, ShutdownWatcher};
use crate::adapters::websocket::{ConnectionSettings, Hub, HubHandle};
use crate::config::{self, AppConfig};
use crate::domain::lifecycle::{CallbackResult, EventManager, RegistryError};

/// Errors raised while wiring the application.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] config::ValidationError),

    #[error("Failed to register cleanup callback: {0}")]
    Registry(#[from] RegistryError),
}

/// Shared subsystems for one process.
pub struct AppContext {
    pub config: AppConfig,
    pub events: Arc<EventManager>,
    /// `None` when realtime messaging is disabled.
    pub hub: Option<HubHandle>,
    hub_task: Option<JoinHandle<()>>,
}

impl AppContext {
    /// Validates `config` and starts the configured subsystems.
    ///
    /// Must be called from within a tokio runtime. The registered hub
    /// teardown blocks until the hub loop has stopped, so shutdown callbacks
    /// must be invoked off the async runtime, as [`ShutdownWatcher`] does.
    pub fn init(config: AppConfig) -> Result<Self, BootstrapError> {
        config.validate()?;

        let events = Arc::new(EventManager::new());

        let (hub, hub_task) = if config.realtime.enabled {
            let (hub, handle) = Hub::new(config.realtime.command_capacity);
            let task = tokio::spawn(hub.run());

            let teardown = handle.clone();
            events.register(&config.shutdown.topic_for("websocket"), move || {
                teardown.shutdown();
                futures::executor::block_on(teardown.stopped());
                Ok(())
            })?;

            (Some(handle), Some(task))
        } else {
            tracing::info!("Realtime messaging disabled");
            (None, None)
        };

        Ok(Self {
            config,
            events,
            hub,
            hub_task,
        })
    }

    /// Registers teardown for `subsystem` under the shutdown prefix.
    pub fn register_cleanup<F>(&self, subsystem: &str, callback: F) -> Result<(), RegistryError>
    where
        F: FnOnce() -> CallbackResult + Send + 'static,
    {
        self.events
            .register(&self.config.shutdown.topic_for(subsystem), callback)
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings::from_config(&self.config.realtime)
    }

    pub fn shutdown_settings(&self) -> ShutdownSettings {
        ShutdownSettings::from_config(&self.config.shutdown)
    }

    /// Installs OS signal handlers bound to this context's callbacks.
    pub fn shutdown_watcher(&self) -> Result<ShutdownWatcher, ShutdownError> {
        ShutdownWatcher::install(Arc::clone(&self.events), self.shutdown_settings())
    }

    /// The complete HTTP router.
    pub fn router(&self) -> Router {
        build_router(
            self.hub.clone(),
            self.connection_settings(),
            &self.config.server,
        )
    }

    /// Takes the hub loop's task handle, if the hub was started.
    pub fn take_hub_task(&mut self) -> Option<JoinHandle<()>> {
        self.hub_task.take()
    }
}
