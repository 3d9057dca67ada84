//! Shutdown watcher - bridges termination signals to cleanup callbacks.
//!
//! ```text
//! signal ──► ShutdownWatcher ──► EventManager::fuzzy_call("shutdown:") ──► exit(code)
//! ```
//!
//! Only the first signal is acted upon. Callbacks run on a blocking thread,
//! bounded by the grace period; when it elapses the process exits anyway.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::ShutdownConfig;
use crate::domain::lifecycle::{EventManager, FuzzyCallReport};

use super::signals::{OsSignals, ShutdownTrigger, SignalSource, TerminationSignal};

/// Errors raised while installing the watcher.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("Failed to install signal handler: {0}")]
    SignalInstall(#[from] std::io::Error),
}

/// How the shutdown sequence runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownSettings {
    /// Prefix passed to `fuzzy_call`.
    pub topic_prefix: String,
    /// `None` waits for callbacks unconditionally.
    pub grace_period: Option<Duration>,
    pub exit_code: i32,
}

impl ShutdownSettings {
    pub fn from_config(config: &ShutdownConfig) -> Self {
        Self {
            topic_prefix: config.topic_prefix.clone(),
            grace_period: config.grace_period(),
            exit_code: config.exit_code,
        }
    }
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self::from_config(&ShutdownConfig::default())
    }
}

/// What the shutdown sequence did.
#[derive(Debug, Clone)]
pub struct ShutdownOutcome {
    pub signal: TerminationSignal,
    /// `None` when the callbacks did not finish within the grace period or
    /// the invocation thread panicked.
    pub report: Option<FuzzyCallReport>,
    pub timed_out: bool,
    pub exit_code: i32,
}

/// Waits for the first termination signal and runs the shutdown sequence.
pub struct ShutdownWatcher {
    source: SignalSource,
    events: Arc<EventManager>,
    settings: ShutdownSettings,
}

impl ShutdownWatcher {
    /// Installs OS signal handlers (SIGINT, SIGTERM, SIGQUIT; Ctrl-C off
    /// unix). Signals delivered after this returns are not lost, even if the
    /// watcher has not been polled yet.
    pub fn install(
        events: Arc<EventManager>,
        settings: ShutdownSettings,
    ) -> Result<Self, ShutdownError> {
        let signals = OsSignals::install()?;
        tracing::debug!(prefix = %settings.topic_prefix, "Shutdown signal handlers installed");
        Ok(Self {
            source: SignalSource::Os(signals),
            events,
            settings,
        })
    }

    /// A watcher driven only by the returned trigger.
    pub fn manual(events: Arc<EventManager>, settings: ShutdownSettings) -> (Self, ShutdownTrigger) {
        let (source, trigger) = SignalSource::manual();
        let watcher = Self {
            source,
            events,
            settings,
        };
        (watcher, trigger)
    }

    pub fn settings(&self) -> &ShutdownSettings {
        &self.settings
    }

    /// Waits for the first signal and runs the sequence, without exiting.
    ///
    /// Returns `None` if the signal source closed before any signal arrived.
    pub async fn run(mut self) -> Option<ShutdownOutcome> {
        let signal = self.source.recv().await?;
        Some(run_shutdown_sequence(signal, self.events, &self.settings).await)
    }

    /// Runs the watcher in the background and terminates the process with
    /// the configured exit code once the sequence completes.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            match self.run().await {
                Some(outcome) => {
                    tracing::info!(
                        signal = %outcome.signal,
                        exit_code = outcome.exit_code,
                        "Shutdown sequence complete, exiting"
                    );
                    std::process::exit(outcome.exit_code);
                }
                None => tracing::debug!("Shutdown signal source closed"),
            }
        })
    }
}

/// Invokes every callback under the shutdown prefix, bounded by the grace
/// period.
pub async fn run_shutdown_sequence(
    signal: TerminationSignal,
    events: Arc<EventManager>,
    settings: &ShutdownSettings,
) -> ShutdownOutcome {
    tracing::warn!(signal = %signal, "Process received termination signal, running shutdown callbacks");

    let prefix = settings.topic_prefix.clone();
    let invocation = tokio::task::spawn_blocking(move || events.fuzzy_call(&prefix));

    let joined = match settings.grace_period {
        Some(grace) => match tokio::time::timeout(grace, invocation).await {
            Ok(joined) => Some(joined),
            Err(_) => {
                tracing::error!(
                    grace_secs = grace.as_secs_f64(),
                    "Shutdown callbacks did not finish within grace period, exiting anyway"
                );
                None
            }
        },
        None => Some(invocation.await),
    };

    let timed_out = joined.is_none();
    let report = match joined {
        Some(Ok(report)) => Some(report),
        Some(Err(e)) => {
            tracing::error!("Shutdown invocation aborted: {}", e);
            None
        }
        None => None,
    };

    if let Some(report) = &report {
        if report.is_clean() {
            tracing::info!(callbacks = report.invoked, "Shutdown callbacks completed");
        } else {
            tracing::error!(
                callbacks = report.invoked,
                failures = report.failures.len(),
                "Shutdown callbacks completed with failures"
            );
        }
    }

    ShutdownOutcome {
        signal,
        report,
        timed_out,
        exit_code: settings.exit_code,
    }
}
