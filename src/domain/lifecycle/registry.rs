//! EventRegistry - ordered storage of cleanup callbacks keyed by topic.
//!
//! The registry has two phases:
//!
//! ```text
//!   Open ──(first fuzzy invocation)──► Frozen
//!   register() appends                register() is rejected
//! ```
//!
//! Topics live in a `BTreeMap`, so prefix matching is a range scan starting
//! at the prefix and stopping at the first key that no longer starts with it.
//! Callbacks are `FnOnce`: taking one out of its slot is what guarantees it
//! runs at most once, however many invocations overlap.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::domain::foundation::ValidationError;

use super::topic::Topic;

/// Result returned by a cleanup callback.
pub type CallbackResult = Result<(), Box<dyn StdError + Send + Sync>>;

/// A zero-argument cleanup callback.
pub type CleanupCallback = Box<dyn FnOnce() -> CallbackResult + Send>;

/// Lifecycle phase of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryPhase {
    /// Startup: callbacks may be appended.
    Open,
    /// Invocation has begun: no further registration.
    Frozen,
}

/// Errors raised by registration.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Registry is frozen, cannot register callback under topic '{topic}'")]
    Frozen { topic: String },

    #[error("Invalid topic: {0}")]
    InvalidTopic(#[from] ValidationError),
}

/// A callback taken out of the registry, ready to be run.
pub struct PendingCallback {
    pub topic: Topic,
    /// Zero-based registration position within the topic.
    pub position: usize,
    pub callback: CleanupCallback,
}

impl std::fmt::Debug for PendingCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCallback")
            .field("topic", &self.topic)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

struct RegistryState {
    phase: RegistryPhase,
    topics: BTreeMap<Topic, Vec<Option<CleanupCallback>>>,
}

/// Topic → ordered callbacks, safe for concurrent registration.
pub struct EventRegistry {
    state: Mutex<RegistryState>,
}

impl EventRegistry {
    /// Creates an empty, open registry.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                phase: RegistryPhase::Open,
                topics: BTreeMap::new(),
            }),
        }
    }

    // Critical sections never run user code, so a poisoned lock still
    // guards consistent state.
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `callback` to the list for `topic`.
    pub fn register(&self, topic: Topic, callback: CleanupCallback) -> Result<(), RegistryError> {
        let mut state = self.lock();
        if state.phase == RegistryPhase::Frozen {
            return Err(RegistryError::Frozen {
                topic: topic.into(),
            });
        }
        state.topics.entry(topic).or_default().push(Some(callback));
        Ok(())
    }

    /// Current phase.
    pub fn phase(&self) -> RegistryPhase {
        self.lock().phase
    }

    /// Moves the registry into the frozen phase. Returns `true` if this call
    /// performed the transition.
    pub fn freeze(&self) -> bool {
        let mut state = self.lock();
        let was_open = state.phase == RegistryPhase::Open;
        state.phase = RegistryPhase::Frozen;
        was_open
    }

    /// Freezes the registry and takes every not-yet-run callback under
    /// topics starting with `prefix`.
    ///
    /// Topics are returned in key order; callbacks within a topic in
    /// registration order.
    pub fn take_matching(&self, prefix: &str) -> Vec<PendingCallback> {
        let mut state = self.lock();
        state.phase = RegistryPhase::Frozen;

        let range = (Bound::Included(prefix), Bound::Unbounded);
        state
            .topics
            .range_mut::<str, _>(range)
            .take_while(|(topic, _)| topic.has_prefix(prefix))
            .flat_map(|(topic, slots)| take_slots(topic, slots))
            .collect()
    }

    /// Takes every not-yet-run callback registered under exactly `topic`.
    ///
    /// Does not change the phase.
    pub fn take_exact(&self, topic: &str) -> Vec<PendingCallback> {
        let mut state = self.lock();
        let range = (Bound::Included(topic), Bound::Included(topic));
        state
            .topics
            .range_mut::<str, _>(range)
            .next()
            .map(|(key, slots)| take_slots(key, slots))
            .unwrap_or_default()
    }

    /// Topics whose names start with `prefix`, in key order.
    pub fn matching_topics(&self, prefix: &str) -> Vec<Topic> {
        let state = self.lock();
        let range = (Bound::Included(prefix), Bound::Unbounded);
        state
            .topics
            .range::<str, _>(range)
            .take_while(|(topic, _)| topic.has_prefix(prefix))
            .map(|(topic, _)| topic.clone())
            .collect()
    }

    /// All registered topics, in key order.
    pub fn topics(&self) -> Vec<Topic> {
        self.lock().topics.keys().cloned().collect()
    }

    /// Whether any callback was ever registered under `topic`.
    pub fn contains(&self, topic: &str) -> bool {
        self.lock().topics.contains_key(topic)
    }

    /// Number of callbacks registered, run or not.
    pub fn callback_count(&self) -> usize {
        self.lock().topics.values().map(Vec::len).sum()
    }

    /// Number of callbacks that have not been run yet.
    pub fn pending_count(&self) -> usize {
        self.lock()
            .topics
            .values()
            .flat_map(|slots| slots.iter())
            .filter(|slot| slot.is_some())
            .count()
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn take_slots(topic: &Topic, slots: &mut [Option<CleanupCallback>]) -> Vec<PendingCallback> {
    slots
        .iter_mut()
        .enumerate()
        .filter_map(|(position, slot)| {
            slot.take().map(|callback| PendingCallback {
                topic: topic.clone(),
                position,
                callback,
            })
        })
        .collect()
}
