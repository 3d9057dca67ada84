//! Lifecycle module - cleanup callbacks addressed by topic prefix.
//!
//! - [`Topic`] - validated callback bucket name
//! - [`EventRegistry`] - append-only topic → callbacks storage
//! - [`EventManager`] - registration and prefix ("fuzzy") invocation

mod manager;
mod registry;
mod topic;

pub use manager::{CallbackFailure, EventManager, FuzzyCallReport};
pub use registry::{
    CallbackResult, CleanupCallback, EventRegistry, PendingCallback, RegistryError, RegistryPhase,
};
pub use topic::Topic;
