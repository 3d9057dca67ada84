//! EventManager - registration and prefix invocation of cleanup callbacks.
//!
//! Independent subsystems register teardown logic during startup:
//!
//! ```ignore
//! events.register("shutdown:database", move || pool.close())?;
//! events.register("shutdown:websocket", move || Ok(hub.shutdown()))?;
//! ```
//!
//! and the shutdown sequence drives all of them with one call:
//!
//! ```ignore
//! let report = events.fuzzy_call("shutdown:");
//! ```
//!
//! Invocation is synchronous: `fuzzy_call` returns once every matched
//! callback has returned. A failing or panicking callback is logged and
//! recorded in the report; the remaining callbacks still run.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use super::registry::{
    CallbackResult, EventRegistry, PendingCallback, RegistryError, RegistryPhase,
};
use super::topic::Topic;

/// One callback that failed during invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackFailure {
    pub topic: Topic,
    /// Registration position within the topic.
    pub position: usize,
    pub reason: String,
}

/// Outcome of an invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FuzzyCallReport {
    /// Prefix (or exact topic) that was invoked.
    pub prefix: String,
    /// Distinct topics whose callbacks ran, in invocation order.
    pub topics: Vec<Topic>,
    /// Callbacks run, including failed ones.
    pub invoked: usize,
    pub failures: Vec<CallbackFailure>,
}

impl FuzzyCallReport {
    /// Callbacks that returned `Ok(())`.
    pub fn succeeded(&self) -> usize {
        self.invoked - self.failures.len()
    }

    /// True when every invoked callback succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Registration and invocation facade over an [`EventRegistry`].
#[derive(Default)]
pub struct EventManager {
    registry: EventRegistry,
}

impl EventManager {
    /// Creates a manager over an empty registry.
    pub fn new() -> Self {
        Self {
            registry: EventRegistry::new(),
        }
    }

    /// Appends `callback` under `topic`.
    ///
    /// Registering after the first `fuzzy_call` is a programming error: it
    /// is logged and rejected.
    pub fn register<F>(&self, topic: &str, callback: F) -> Result<(), RegistryError>
    where
        F: FnOnce() -> CallbackResult + Send + 'static,
    {
        let topic = Topic::new(topic)?;
        let name = topic.to_string();
        match self.registry.register(topic, Box::new(callback)) {
            Ok(()) => {
                tracing::debug!(topic = %name, "Cleanup callback registered");
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "Cleanup callback registered after invocation began");
                Err(err)
            }
        }
    }

    /// Runs every pending callback under every topic starting with `prefix`.
    ///
    /// Freezes the registry. Each callback runs at most once over the life of
    /// the manager, so repeated calls only pick up what has not run yet.
    pub fn fuzzy_call(&self, prefix: &str) -> FuzzyCallReport {
        if self.registry.freeze() {
            tracing::debug!(prefix, "Event registry frozen");
        }
        let pending = self.registry.take_matching(prefix);
        tracing::info!(prefix, callbacks = pending.len(), "Invoking cleanup callbacks");
        run_callbacks(prefix, pending)
    }

    /// Runs every pending callback registered under exactly `topic`.
    pub fn call(&self, topic: &str) -> FuzzyCallReport {
        let pending = self.registry.take_exact(topic);
        run_callbacks(topic, pending)
    }

    /// Whether anything was registered under exactly `topic`.
    pub fn contains(&self, topic: &str) -> bool {
        self.registry.contains(topic)
    }

    /// All registered topics, in key order.
    pub fn topics(&self) -> Vec<Topic> {
        self.registry.topics()
    }

    /// Topics a `fuzzy_call(prefix)` would reach.
    pub fn matching_topics(&self, prefix: &str) -> Vec<Topic> {
        self.registry.matching_topics(prefix)
    }

    /// Whether invocation has begun.
    pub fn is_frozen(&self) -> bool {
        self.registry.phase() == RegistryPhase::Frozen
    }

    /// Callbacks not yet run.
    pub fn pending_count(&self) -> usize {
        self.registry.pending_count()
    }
}

fn run_callbacks(prefix: &str, pending: Vec<PendingCallback>) -> FuzzyCallReport {
    let mut report = FuzzyCallReport {
        prefix: prefix.to_string(),
        ..FuzzyCallReport::default()
    };

    for PendingCallback {
        topic,
        position,
        callback,
    } in pending
    {
        if report.topics.last() != Some(&topic) {
            report.topics.push(topic.clone());
        }
        report.invoked += 1;

        let reason = match panic::catch_unwind(AssertUnwindSafe(callback)) {
            Ok(Ok(())) => {
                tracing::debug!(topic = %topic, position, "Cleanup callback completed");
                continue;
            }
            Ok(Err(err)) => err.to_string(),
            Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
        };

        tracing::error!(topic = %topic, position, reason = %reason, "Cleanup callback failed");
        report.failures.push(CallbackFailure {
            topic,
            position,
            reason,
        });
    }

    report
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
