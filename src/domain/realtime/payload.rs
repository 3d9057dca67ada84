//! Broadcast payloads.

use std::sync::Arc;

/// A message fanned out to connections.
///
/// Backed by `Arc` so a broadcast to N connections clones N pointers, not N
/// buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(Arc<str>),
    Binary(Arc<[u8]>),
}

impl Payload {
    /// Creates a text payload.
    pub fn text(text: impl Into<String>) -> Self {
        Payload::Text(Arc::from(text.into()))
    }

    /// Creates a binary payload.
    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        Payload::Binary(Arc::from(bytes.into()))
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        match self {
            Payload::Text(text) => text.len(),
            Payload::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The text content, if this is a text payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text.as_ref()),
            Payload::Binary(_) => None,
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::text(text)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::binary(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_buffer() {
        let payload = Payload::text("hello");
        let copy = payload.clone();
        match (&payload, &copy) {
            (Payload::Text(a), Payload::Text(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("expected text payloads"),
        }
    }

    #[test]
    fn len_counts_bytes() {
        assert_eq!(Payload::text("héllo").len(), 6);
        assert_eq!(Payload::binary(vec![1, 2, 3]).len(), 3);
        assert!(Payload::text("").is_empty());
    }

    #[test]
    fn as_text_only_for_text() {
        assert_eq!(Payload::from("x").as_text(), Some("x"));
        assert_eq!(Payload::from(vec![0u8]).as_text(), None);
    }
}
