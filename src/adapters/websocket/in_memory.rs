//! In-memory transport implementation for testing.
//!
//! Provides a connected pair: the reader/writer halves handed to a
//! [`Connection`](super::Connection), and an [`InMemoryPeer`] that plays the
//! remote client.
//!
//! # Example
//!
//! ```ignore
//! let (reader, writer, mut peer) = in_memory_transport();
//! tokio::spawn(Connection::new(reader, writer, settings).serve(hub));
//!
//! peer.send_text("hello");
//! assert_eq!(peer.next_text().await.as_deref(), Some("hello"));
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::domain::realtime::Payload;
use crate::ports::{Frame, TransportError, TransportReader, TransportWriter};

/// Creates a connected reader, writer and remote peer.
pub fn in_memory_transport() -> (InMemoryReader, InMemoryWriter, InMemoryPeer) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (pause_tx, pause_rx) = watch::channel(false);
    let closes = Arc::new(AtomicUsize::new(0));
    let fail_writes = Arc::new(AtomicBool::new(false));

    let reader = InMemoryReader { inbound: inbound_rx };
    let writer = InMemoryWriter {
        outbound: outbound_tx,
        paused: pause_rx,
        fail_writes: Arc::clone(&fail_writes),
        closes: Arc::clone(&closes),
        closed: false,
    };
    let peer = InMemoryPeer {
        inbound: inbound_tx,
        outbound: outbound_rx,
        pause: pause_tx,
        fail_writes,
        closes,
    };
    (reader, writer, peer)
}

/// Reader half: yields whatever the peer sends.
pub struct InMemoryReader {
    inbound: mpsc::UnboundedReceiver<Result<Frame, TransportError>>,
}

#[async_trait]
impl TransportReader for InMemoryReader {
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        self.inbound.recv().await
    }
}

/// Writer half: delivers frames to the peer, and can be stalled or failed
/// from the peer side.
pub struct InMemoryWriter {
    outbound: mpsc::UnboundedSender<Frame>,
    paused: watch::Receiver<bool>,
    fail_writes: Arc<AtomicBool>,
    closes: Arc<AtomicUsize>,
    closed: bool,
}

#[async_trait]
impl TransportWriter for InMemoryWriter {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        // A dropped peer also releases a paused writer.
        if self.paused.wait_for(|paused| !*paused).await.is_err() {
            return Err(TransportError::Closed);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::Protocol("write failed".to_string()));
        }
        self.outbound.send(frame).map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.closed = true;
        Ok(())
    }
}

/// The remote end of an in-memory transport.
pub struct InMemoryPeer {
    inbound: mpsc::UnboundedSender<Result<Frame, TransportError>>,
    outbound: mpsc::UnboundedReceiver<Frame>,
    pause: watch::Sender<bool>,
    fail_writes: Arc<AtomicBool>,
    closes: Arc<AtomicUsize>,
}

impl InMemoryPeer {
    /// Sends a frame to the connection. Ignored once the reader is gone.
    pub fn send(&self, frame: Frame) {
        let _ = self.inbound.send(Ok(frame));
    }

    pub fn send_text(&self, text: impl Into<String>) {
        self.send(Frame::Text(text.into()));
    }

    /// Makes the connection's next read fail with `error`.
    pub fn send_error(&self, error: TransportError) {
        let _ = self.inbound.send(Err(error));
    }

    /// Stalls every write until [`resume_writes`](Self::resume_writes).
    pub fn pause_writes(&self) {
        self.pause.send_replace(true);
    }

    pub fn resume_writes(&self) {
        self.pause.send_replace(false);
    }

    /// Makes every following write fail.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Next frame written by the connection, heartbeats included.
    ///
    /// `None` once the writer half is dropped and everything it wrote has
    /// been read.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        self.outbound.recv().await
    }

    /// Next data frame written by the connection, skipping heartbeats.
    pub async fn next_payload(&mut self) -> Option<Payload> {
        loop {
            match self.next_frame().await? {
                Frame::Text(text) => return Some(Payload::text(text)),
                Frame::Binary(bytes) => return Some(Payload::binary(bytes)),
                Frame::Ping(_) | Frame::Pong(_) => continue,
                Frame::Close => return None,
            }
        }
    }

    /// Next text frame written by the connection, skipping heartbeats.
    pub async fn next_text(&mut self) -> Option<String> {
        self.next_payload()
            .await
            .and_then(|payload| payload.as_text().map(str::to_string))
    }

    /// Everything written so far, without waiting.
    pub fn drain_payloads(&mut self) -> Vec<Payload> {
        let mut payloads = Vec::new();
        while let Ok(frame) = self.outbound.try_recv() {
            match frame {
                Frame::Text(text) => payloads.push(Payload::text(text)),
                Frame::Binary(bytes) => payloads.push(Payload::binary(bytes)),
                _ => {}
            }
        }
        payloads
    }

    /// How many times the writer half was closed.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Shared close counter, readable after the peer is dropped.
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }
}
