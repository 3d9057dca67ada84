//! Topic value object for cleanup callback registration.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::domain::foundation::ValidationError;

/// Name of a bucket of cleanup callbacks.
///
/// Conventionally `<domain>:<action>`, e.g. `shutdown:database`. The
/// separator is a convention only; matching is always a literal string
/// prefix over the whole name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    /// Separator between the domain and action parts of a topic name.
    pub const SEPARATOR: char = ':';

    /// Creates a topic, rejecting empty names and names containing whitespace.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ValidationError::empty_field("topic"));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(ValidationError::invalid_format(
                "topic",
                "must not contain whitespace",
            ));
        }
        Ok(Self(name))
    }

    /// Returns the topic name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before the first separator, if the name has one.
    pub fn domain(&self) -> Option<&str> {
        self.0.split_once(Self::SEPARATOR).map(|(domain, _)| domain)
    }

    /// The part after the first separator, if the name has one.
    pub fn action(&self) -> Option<&str> {
        self.0.split_once(Self::SEPARATOR).map(|(_, action)| action)
    }

    /// Whether this topic's name starts with the literal `prefix`.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Lets the registry range-scan its BTreeMap<Topic, _> with a plain &str.
impl Borrow<str> for Topic {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Topic {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Topic {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}
