//! Transport ports - Interface for a bidirectional message connection.
//!
//! A realtime connection is split into a reader half and a writer half so
//! that one reader task and one writer task can own them independently.
//! The axum WebSocket adapter implements both; tests use the in-memory
//! adapter.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::realtime::Payload;

/// One transport-level message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

impl Frame {
    /// Frame carrying a broadcast payload.
    pub fn from_payload(payload: &Payload) -> Self {
        match payload {
            Payload::Text(text) => Frame::Text(text.to_string()),
            Payload::Binary(bytes) => Frame::Binary(bytes.to_vec()),
        }
    }

    /// Size of the frame body in bytes.
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(bytes) | Frame::Ping(bytes) | Frame::Pong(bytes) => bytes.len(),
            Frame::Close => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Errors raised by a transport half.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Peer went away or the transport was already closed.
    #[error("Transport closed")]
    Closed,

    /// A read or write did not complete within its deadline.
    #[error("Transport operation timed out")]
    Timeout,

    /// Inbound message exceeded the configured limit.
    #[error("Message of {size} bytes exceeds limit of {limit} bytes")]
    MessageTooLarge { size: usize, limit: usize },

    /// Underlying protocol or I/O failure.
    #[error("Transport error: {0}")]
    Protocol(String),
}

/// Reader half of a connection.
#[async_trait]
pub trait TransportReader: Send {
    /// Next inbound frame. `None` once the peer has closed the stream.
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>>;
}

/// Writer half of a connection.
#[async_trait]
pub trait TransportWriter: Send {
    /// Sends one frame.
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Closes the transport. Called exactly once, by the writer task.
    async fn close(&mut self) -> Result<(), TransportError>;
}
