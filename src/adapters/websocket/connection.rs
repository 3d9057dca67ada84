//! A live realtime connection and its reader/writer task pair.
//!
//! Lifecycle of one connection:
//! 1. Create the outbound queue (and queue the greeting)
//! 2. Register with the hub
//! 3. Spawn the writer task: drains the queue, sends heartbeats, owns the writer half
//! 4. Spawn the reader task: owns the reader half, enforces deadlines and size limits
//! 5. When either side ends, deregister; the writer closes the transport exactly once

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::RealtimeConfig;
use crate::domain::foundation::ConnectionId;
use crate::domain::realtime::Payload;
use crate::ports::{Frame, TransportError, TransportReader, TransportWriter};

use super::hub::{ConnectionHandle, HubHandle};
use super::messages::ServerMessage;

/// Per-connection limits and behaviour.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub outbound_capacity: usize,
    pub ping_period: Duration,
    /// `None` disables the read deadline.
    pub read_deadline: Option<Duration>,
    pub write_deadline: Duration,
    pub max_message_size: usize,
    pub heartbeat_fail_max: u32,
    pub relay_inbound: bool,
    pub send_greeting: bool,
}

impl ConnectionSettings {
    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self {
            outbound_capacity: config.outbound_capacity.max(1),
            ping_period: config.ping_period(),
            read_deadline: config.read_deadline(),
            write_deadline: config.write_deadline(),
            max_message_size: config.max_message_size,
            heartbeat_fail_max: config.heartbeat_fail_max.max(1),
            relay_inbound: config.relay_inbound,
            send_greeting: config.send_greeting,
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from_config(&RealtimeConfig::default())
    }
}

/// Why a connection ended.
#[derive(Debug)]
pub enum CloseReason {
    /// Peer sent a close frame or ended the stream.
    PeerClosed,
    /// The hub dropped the queue (deregistration or hub shutdown) and the
    /// writer flushed what was left.
    Drained,
    /// Outbound queue overflowed.
    Evicted,
    /// Too many consecutive heartbeat failures.
    HeartbeatFailed,
    /// The hub was not running when the connection tried to use it.
    HubClosed,
    /// Read or write failure, including deadlines and size limits.
    Transport(TransportError),
    /// A connection task panicked or was cancelled.
    Aborted,
}

/// One upgraded connection, not yet registered.
pub struct Connection<R, W> {
    id: ConnectionId,
    reader: R,
    writer: W,
    settings: ConnectionSettings,
}

impl<R, W> Connection<R, W>
where
    R: TransportReader + 'static,
    W: TransportWriter + 'static,
{
    /// Wraps the two transport halves under a fresh id.
    pub fn new(reader: R, writer: W, settings: ConnectionSettings) -> Self {
        Self {
            id: ConnectionId::new(),
            reader,
            writer,
            settings,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Registers with the hub and runs until the connection ends.
    pub async fn serve(self, hub: HubHandle) -> CloseReason {
        let Connection {
            id,
            reader,
            mut writer,
            settings,
        } = self;

        let (outbound_tx, outbound_rx) = mpsc::channel(settings.outbound_capacity);
        let evict = Arc::new(Notify::new());

        if settings.send_greeting {
            match ServerMessage::connected(id).to_payload() {
                Ok(greeting) => {
                    let _ = outbound_tx.try_send(greeting);
                }
                Err(e) => tracing::warn!(connection_id = %id, "Failed to encode greeting: {}", e),
            }
        }

        let handle = ConnectionHandle::new(id, outbound_tx, Arc::clone(&evict));
        if hub.register(handle).await.is_err() {
            reject(id, &mut writer, settings.write_deadline).await;
            return CloseReason::HubClosed;
        }

        let mut write_task = tokio::spawn(write_pump(id, writer, outbound_rx, evict, settings.clone()));
        let mut read_task = tokio::spawn(read_pump(id, reader, hub.clone(), settings));

        let reason = tokio::select! {
            result = &mut write_task => {
                read_task.abort();
                result.unwrap_or(CloseReason::Aborted)
            }
            result = &mut read_task => {
                let reason = result.unwrap_or(CloseReason::Aborted);
                // Deregistering drops the queue, which lets the writer finish.
                let _ = hub.deregister(id).await;
                let _ = write_task.await;
                reason
            }
        };

        let _ = hub.deregister(id).await;
        tracing::debug!(connection_id = %id, reason = ?reason, "Connection closed");
        reason
    }
}

async fn reject<W: TransportWriter>(id: ConnectionId, writer: &mut W, deadline: Duration) {
    tracing::debug!(connection_id = %id, "Hub not running, rejecting connection");
    if let Ok(Payload::Text(text)) =
        ServerMessage::error("HUB_UNAVAILABLE", "Realtime messaging is not available").to_payload()
    {
        let _ = write_with_deadline(writer, Frame::Text(text.to_string()), deadline).await;
    }
    let _ = writer.close().await;
}

async fn write_with_deadline<W: TransportWriter>(
    writer: &mut W,
    frame: Frame,
    deadline: Duration,
) -> Result<(), TransportError> {
    match time::timeout(deadline, writer.send(frame)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout),
    }
}

async fn write_pump<W: TransportWriter>(
    id: ConnectionId,
    mut writer: W,
    mut outbound: mpsc::Receiver<Payload>,
    evict: Arc<Notify>,
    settings: ConnectionSettings,
) -> CloseReason {
    // `interval_at` panics on a zero period.
    let period = settings.ping_period.max(Duration::from_millis(1));
    let mut heartbeat = time::interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failed_pings = 0u32;

    let reason = loop {
        tokio::select! {
            biased;

            _ = evict.notified() => break CloseReason::Evicted,

            next = outbound.recv() => {
                let Some(payload) = next else {
                    break CloseReason::Drained;
                };
                tokio::select! {
                    biased;
                    _ = evict.notified() => break CloseReason::Evicted,
                    result = write_with_deadline(&mut writer, Frame::from_payload(&payload), settings.write_deadline) => {
                        if let Err(e) = result {
                            tracing::debug!(connection_id = %id, "Write failed, closing connection: {}", e);
                            break CloseReason::Transport(e);
                        }
                        failed_pings = 0;
                    }
                }
            }

            _ = heartbeat.tick() => {
                match write_with_deadline(&mut writer, Frame::Ping(Vec::new()), settings.write_deadline).await {
                    Ok(()) => failed_pings = 0,
                    Err(TransportError::Closed) => break CloseReason::Transport(TransportError::Closed),
                    Err(e) => {
                        failed_pings += 1;
                        tracing::debug!(connection_id = %id, failed_pings, "Heartbeat failed: {}", e);
                        if failed_pings >= settings.heartbeat_fail_max {
                            break CloseReason::HeartbeatFailed;
                        }
                    }
                }
            }
        }
    };

    if let Err(e) = writer.close().await {
        tracing::trace!(connection_id = %id, "Transport close failed: {}", e);
    }
    reason
}

async fn read_pump<R: TransportReader>(
    id: ConnectionId,
    mut reader: R,
    hub: HubHandle,
    settings: ConnectionSettings,
) -> CloseReason {
    loop {
        let next = match settings.read_deadline {
            Some(deadline) => match time::timeout(deadline, reader.recv()).await {
                Ok(next) => next,
                Err(_) => {
                    tracing::debug!(connection_id = %id, "Read deadline elapsed");
                    return CloseReason::Transport(TransportError::Timeout);
                }
            },
            None => reader.recv().await,
        };

        let frame = match next {
            None => return CloseReason::PeerClosed,
            Some(Err(e)) => {
                tracing::debug!(connection_id = %id, "Receive error: {}", e);
                return CloseReason::Transport(e);
            }
            Some(Ok(frame)) => frame,
        };

        if frame.len() > settings.max_message_size {
            tracing::warn!(
                connection_id = %id,
                size = frame.len(),
                limit = settings.max_message_size,
                "Inbound message too large, closing connection"
            );
            return CloseReason::Transport(TransportError::MessageTooLarge {
                size: frame.len(),
                limit: settings.max_message_size,
            });
        }

        let payload = match frame {
            Frame::Text(text) => Payload::text(text),
            Frame::Binary(bytes) => Payload::binary(bytes),
            // Any frame refreshes the read deadline; nothing else to do.
            Frame::Ping(_) | Frame::Pong(_) => continue,
            Frame::Close => return CloseReason::PeerClosed,
        };

        if !settings.relay_inbound {
            tracing::trace!(connection_id = %id, size = payload.len(), "Inbound message ignored");
            continue;
        }
        if hub.broadcast(payload).await.is_err() {
            return CloseReason::HubClosed;
        }
    }
}
