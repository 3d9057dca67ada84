//! Connection hub - the registry of live connections.
//!
//! Every mutation of the live set and every broadcast passes through one
//! command channel into one coordination loop:
//!
//! ```text
//!  HubHandle ──register / deregister / broadcast / send_to──►  ┌────────────┐
//!  HubHandle ──────────────────────────────────────────────►  │  Hub::run  │
//!  HubHandle::shutdown ──(watch)───────────────────────────►  └─────┬──────┘
//!                                                                   │ try_send
//!                              ┌────────────────────────────────────┼───────────┐
//!                              ▼                                    ▼           ▼
//!                       outbound queue A                    outbound queue B   ...
//!                       (writer task A)                     (writer task B)
//! ```
//!
//! The set is owned by the loop, so it needs no lock. Requests are applied
//! in arrival order, which gives a total order over register, deregister and
//! broadcast. Delivery into an outbound queue never waits: a full queue means
//! the peer is not keeping up, and the connection is evicted.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch, Notify};

use crate::domain::foundation::ConnectionId;
use crate::domain::realtime::Payload;

/// Errors returned by [`HubHandle`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    #[error("Connection hub is not running")]
    Closed,
}

/// What the hub holds for one live connection: the producer side of its
/// outbound queue and the signal used to evict it.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound: mpsc::Sender<Payload>,
    evict: Arc<Notify>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, outbound: mpsc::Sender<Payload>, evict: Arc<Notify>) -> Self {
        Self {
            id,
            outbound,
            evict,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Result of one broadcast, as applied by the coordination loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections whose queue accepted the payload.
    pub delivered: Vec<ConnectionId>,
    /// Connections removed because their queue was full or gone.
    pub evicted: Vec<ConnectionId>,
}

enum HubCommand {
    Register(ConnectionHandle),
    Deregister(ConnectionId),
    Broadcast {
        payload: Payload,
        report: Option<oneshot::Sender<BroadcastReport>>,
    },
    SendTo {
        id: ConnectionId,
        payload: Payload,
        delivered: oneshot::Sender<bool>,
    },
    Snapshot(oneshot::Sender<Vec<ConnectionId>>),
}

impl std::fmt::Debug for HubCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HubCommand::Register(handle) => write!(f, "Register({})", handle.id),
            HubCommand::Deregister(id) => write!(f, "Deregister({})", id),
            HubCommand::Broadcast { payload, .. } => write!(f, "Broadcast({} bytes)", payload.len()),
            HubCommand::SendTo { id, payload, .. } => {
                write!(f, "SendTo({}, {} bytes)", id, payload.len())
            }
            HubCommand::Snapshot(_) => f.write_str("Snapshot"),
        }
    }
}

/// The coordination loop and the live set it owns.
pub struct Hub {
    commands: mpsc::Receiver<HubCommand>,
    shutdown: watch::Receiver<bool>,
    stopped: watch::Sender<bool>,
    connections: HashMap<ConnectionId, ConnectionHandle>,
}

impl Hub {
    /// Creates a hub and the handle used to reach it.
    ///
    /// Nothing happens until [`Hub::run`] is polled.
    pub fn new(command_capacity: usize) -> (Self, HubHandle) {
        let (command_tx, command_rx) = mpsc::channel(command_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (stopped_tx, stopped_rx) = watch::channel(false);

        let hub = Self {
            commands: command_rx,
            shutdown: shutdown_rx,
            stopped: stopped_tx,
            connections: HashMap::new(),
        };
        let handle = HubHandle {
            commands: command_tx,
            shutdown: Arc::new(shutdown_tx),
            stopped: stopped_rx,
        };
        (hub, handle)
    }

    /// Runs the coordination loop until shutdown is requested or every
    /// handle is dropped.
    ///
    /// Requests accepted before shutdown are still applied; later ones fail
    /// with [`HubError::Closed`]. On exit every outbound queue is dropped, so
    /// each writer task drains what it already holds and closes its transport.
    pub async fn run(mut self) {
        tracing::info!("Connection hub started");

        loop {
            tokio::select! {
                biased;

                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }

                command = self.commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => break,
                },
            }
        }

        self.commands.close();
        while let Some(command) = self.commands.recv().await {
            self.apply(command);
        }

        let remaining = self.connections.len();
        self.connections.clear();
        self.stopped.send_replace(true);
        tracing::info!(connections = remaining, "Connection hub stopped");
    }

    fn apply(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register(handle) => self.register(handle),
            HubCommand::Deregister(id) => self.deregister(id),
            HubCommand::Broadcast { payload, report } => {
                let outcome = self.broadcast(&payload);
                if let Some(report) = report {
                    let _ = report.send(outcome);
                }
            }
            HubCommand::SendTo {
                id,
                payload,
                delivered,
            } => {
                let _ = delivered.send(self.send_to(id, payload));
            }
            HubCommand::Snapshot(reply) => {
                let _ = reply.send(self.connections.keys().copied().collect());
            }
        }
    }

    fn register(&mut self, handle: ConnectionHandle) {
        let id = handle.id;
        if self.connections.contains_key(&id) {
            // Dropping the duplicate closes its queue; the first registration stays live.
            tracing::error!(connection_id = %id, "Connection registered twice, rejecting duplicate");
            return;
        }
        self.connections.insert(id, handle);
        tracing::debug!(connection_id = %id, live = self.connections.len(), "Connection registered");
    }

    fn deregister(&mut self, id: ConnectionId) {
        match self.connections.remove(&id) {
            Some(_) => {
                tracing::debug!(connection_id = %id, live = self.connections.len(), "Connection deregistered");
            }
            None => {
                tracing::trace!(connection_id = %id, "Deregister for unknown connection ignored");
            }
        }
    }

    fn broadcast(&mut self, payload: &Payload) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        self.connections.retain(|id, handle| {
            let kept = offer(handle, payload.clone());
            if kept {
                report.delivered.push(*id);
            } else {
                report.evicted.push(*id);
            }
            kept
        });

        if !report.evicted.is_empty() {
            tracing::debug!(
                delivered = report.delivered.len(),
                evicted = report.evicted.len(),
                "Broadcast evicted connections"
            );
        }
        report
    }

    fn send_to(&mut self, id: ConnectionId, payload: Payload) -> bool {
        let Some(handle) = self.connections.get(&id) else {
            return false;
        };
        if offer(handle, payload) {
            return true;
        }
        self.connections.remove(&id);
        false
    }
}

// Non-blocking hand-off into one outbound queue. On `false` the caller
// removes the connection from the live set.
fn offer(handle: &ConnectionHandle, payload: Payload) -> bool {
    match handle.outbound.try_send(payload) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::warn!(connection_id = %handle.id, "Outbound queue full, evicting slow consumer");
            handle.evict.notify_one();
            false
        }
        Err(TrySendError::Closed(_)) => {
            tracing::debug!(connection_id = %handle.id, "Outbound queue closed, evicting connection");
            false
        }
    }
}

/// Cloneable access to a running [`Hub`].
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<HubCommand>,
    shutdown: Arc<watch::Sender<bool>>,
    stopped: watch::Receiver<bool>,
}

impl HubHandle {
    async fn submit(&self, command: HubCommand) -> Result<(), HubError> {
        self.commands.send(command).await.map_err(|_| HubError::Closed)
    }

    /// Adds a connection to the live set.
    pub async fn register(&self, handle: ConnectionHandle) -> Result<(), HubError> {
        self.submit(HubCommand::Register(handle)).await
    }

    /// Removes a connection from the live set and closes its queue.
    ///
    /// Deregistering an unknown or already removed id is a no-op.
    pub async fn deregister(&self, id: ConnectionId) -> Result<(), HubError> {
        self.submit(HubCommand::Deregister(id)).await
    }

    /// Queues `payload` for every connection live when the loop reaches it.
    pub async fn broadcast(&self, payload: impl Into<Payload>) -> Result<(), HubError> {
        self.submit(HubCommand::Broadcast {
            payload: payload.into(),
            report: None,
        })
        .await
    }

    /// Like [`broadcast`](Self::broadcast), and waits for the loop to report
    /// which connections took the payload.
    pub async fn broadcast_with_report(
        &self,
        payload: impl Into<Payload>,
    ) -> Result<BroadcastReport, HubError> {
        let (tx, rx) = oneshot::channel();
        self.submit(HubCommand::Broadcast {
            payload: payload.into(),
            report: Some(tx),
        })
        .await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Queues `payload` for one connection. Returns `false` if the connection
    /// is not live or was evicted by this send.
    pub async fn send_to(
        &self,
        id: ConnectionId,
        payload: impl Into<Payload>,
    ) -> Result<bool, HubError> {
        let (tx, rx) = oneshot::channel();
        self.submit(HubCommand::SendTo {
            id,
            payload: payload.into(),
            delivered: tx,
        })
        .await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// The live set as seen by the loop at the point this request is reached.
    pub async fn live_connections(&self) -> Result<Vec<ConnectionId>, HubError> {
        let (tx, rx) = oneshot::channel();
        self.submit(HubCommand::Snapshot(tx)).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> Result<usize, HubError> {
        self.live_connections().await.map(|ids| ids.len())
    }

    /// Asks the loop to stop. Safe to call from synchronous code and more
    /// than once.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Resolves once the coordination loop has applied its last request and
    /// released every outbound queue.
    pub async fn stopped(&self) {
        let mut stopped = self.stopped.clone();
        // An error means the hub was dropped, which also releases the queues.
        let _ = stopped.wait_for(|stopped| *stopped).await;
    }

    /// Whether the hub has stopped accepting requests.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn spawn_hub() -> HubHandle {
        let (hub, handle) = Hub::new(64);
        tokio::spawn(hub.run());
        handle
    }

    fn queue(
        capacity: usize,
    ) -> (ConnectionId, ConnectionHandle, mpsc::Receiver<Payload>, Arc<Notify>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(capacity);
        let evict = Arc::new(Notify::new());
        (id, ConnectionHandle::new(id, tx, Arc::clone(&evict)), rx, evict)
    }

    #[tokio::test]
    async fn register_makes_connection_live() {
        let hub = spawn_hub();
        let (id, handle, _rx, _) = queue(4);

        hub.register(handle).await.unwrap();

        assert_eq!(hub.live_connections().await.unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_live_connection() {
        let hub = spawn_hub();
        let (_, a, mut rx_a, _) = queue(4);
        let (_, b, mut rx_b, _) = queue(4);
        hub.register(a).await.unwrap();
        hub.register(b).await.unwrap();

        let report = hub.broadcast_with_report("X").await.unwrap();

        assert_eq!(report.delivered.len(), 2);
        assert!(report.evicted.is_empty());
        assert_eq!(rx_a.recv().await, Some(Payload::text("X")));
        assert_eq!(rx_b.recv().await, Some(Payload::text("X")));
    }

    #[tokio::test]
    async fn deregister_closes_queue_and_is_idempotent() {
        let hub = spawn_hub();
        let (id, handle, mut rx, _) = queue(4);
        hub.register(handle).await.unwrap();

        hub.deregister(id).await.unwrap();
        hub.deregister(id).await.unwrap();

        assert_eq!(rx.recv().await, None);
        assert!(hub.live_connections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn full_queue_evicts_connection() {
        let hub = spawn_hub();
        let (id, handle, mut rx, evict) = queue(1);
        hub.register(handle).await.unwrap();

        let first = hub.broadcast_with_report("1").await.unwrap();
        let second = hub.broadcast_with_report("2").await.unwrap();
        let third = hub.broadcast_with_report("3").await.unwrap();

        assert_eq!(first.delivered, vec![id]);
        assert_eq!(second.evicted, vec![id]);
        assert!(third.delivered.is_empty() && third.evicted.is_empty());
        // The eviction signal is latched for the writer.
        evict.notified().await;
        assert_eq!(rx.recv().await, Some(Payload::text("1")));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn slow_consumer_does_not_block_others() {
        let hub = spawn_hub();
        let (_, slow, _slow_rx, _) = queue(1);
        let (fast_id, fast, mut fast_rx, _) = queue(16);
        hub.register(slow).await.unwrap();
        hub.register(fast).await.unwrap();

        for i in 0..5 {
            hub.broadcast(format!("m{}", i)).await.unwrap();
        }

        for i in 0..5 {
            assert_eq!(fast_rx.recv().await, Some(Payload::text(format!("m{}", i))));
        }
        assert_eq!(hub.live_connections().await.unwrap(), vec![fast_id]);
    }

    #[tokio::test]
    async fn closed_queue_is_evicted_on_next_broadcast() {
        let hub = spawn_hub();
        let (id, handle, rx, _) = queue(4);
        hub.register(handle).await.unwrap();
        drop(rx);

        let report = hub.broadcast_with_report("X").await.unwrap();

        assert_eq!(report.evicted, vec![id]);
        assert_eq!(hub.connection_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_registration_keeps_original() {
        let hub = spawn_hub();
        let (id, original, mut original_rx, _) = queue(4);
        let (dup_tx, mut dup_rx) = mpsc::channel(4);
        hub.register(original).await.unwrap();

        hub.register(ConnectionHandle::new(id, dup_tx, Arc::new(Notify::new())))
            .await
            .unwrap();
        hub.broadcast("X").await.unwrap();

        assert_eq!(original_rx.recv().await, Some(Payload::text("X")));
        assert_eq!(dup_rx.recv().await, None);
    }

    #[tokio::test]
    async fn send_to_targets_one_connection() {
        let hub = spawn_hub();
        let (a_id, a, mut rx_a, _) = queue(4);
        let (_, b, mut rx_b, _) = queue(4);
        hub.register(a).await.unwrap();
        hub.register(b).await.unwrap();

        assert!(hub.send_to(a_id, "only-a").await.unwrap());
        assert!(!hub.send_to(ConnectionId::new(), "nobody").await.unwrap());
        hub.broadcast("all").await.unwrap();

        assert_eq!(rx_a.recv().await, Some(Payload::text("only-a")));
        assert_eq!(rx_a.recv().await, Some(Payload::text("all")));
        assert_eq!(rx_b.recv().await, Some(Payload::text("all")));
    }

    #[tokio::test]
    async fn shutdown_stops_loop_and_drops_queues() {
        let (hub, handle) = Hub::new(8);
        let task = tokio::spawn(hub.run());
        let (_, conn, mut rx, _) = queue(4);
        handle.register(conn).await.unwrap();
        handle.broadcast("last").await.unwrap();
        // Make sure the broadcast was applied before shutting down.
        handle.connection_count().await.unwrap();

        handle.shutdown();
        task.await.unwrap();

        assert!(handle.is_closed());
        assert_eq!(rx.recv().await, Some(Payload::text("last")));
        assert_eq!(rx.recv().await, None);
        assert_eq!(handle.broadcast("late").await, Err(HubError::Closed));
    }

    #[tokio::test]
    async fn requests_accepted_before_shutdown_are_applied() {
        let (hub, handle) = Hub::new(8);
        let (_, conn, mut rx, _) = queue(4);
        let (gone_id, gone, mut gone_rx, _) = queue(4);

        // Nothing yields between these calls, so the loop sees the shutdown
        // flag before it has applied any of them.
        handle.register(conn).await.unwrap();
        handle.register(gone).await.unwrap();
        handle.broadcast("first").await.unwrap();
        handle.deregister(gone_id).await.unwrap();
        handle.broadcast("last words").await.unwrap();
        handle.shutdown();

        hub.run().await;

        assert_eq!(rx.recv().await, Some(Payload::text("first")));
        assert_eq!(rx.recv().await, Some(Payload::text("last words")));
        assert_eq!(rx.recv().await, None);
        assert_eq!(gone_rx.recv().await, Some(Payload::text("first")));
        assert_eq!(gone_rx.recv().await, None);
        assert_eq!(handle.broadcast("late").await, Err(HubError::Closed));
        handle.stopped().await;
    }

    #[tokio::test]
    async fn stopped_resolves_after_shutdown() {
        let hub = spawn_hub();
        hub.shutdown();
        hub.shutdown();
        hub.stopped().await;
        assert!(hub.is_closed());
    }

    #[tokio::test]
    async fn loop_exits_when_all_handles_dropped() {
        let (hub, handle) = Hub::new(8);
        let task = tokio::spawn(hub.run());
        drop(handle);
        task.await.unwrap();
    }

    #[derive(Debug, Clone)]
    enum Op {
        Register(usize),
        Deregister(usize),
        Broadcast,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..6usize).prop_map(Op::Register),
            (0..6usize).prop_map(Op::Deregister),
            Just(Op::Broadcast),
        ]
    }

    proptest! {
        #[test]
        fn every_broadcast_sees_exactly_the_live_set(ops in proptest::collection::vec(op(), 1..40)) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async move {
                let hub = spawn_hub();
                let ids: Vec<ConnectionId> = (0..6).map(|_| ConnectionId::new()).collect();
                let mut model: HashSet<ConnectionId> = HashSet::new();
                let mut receivers = Vec::new();

                for op in ops {
                    match op {
                        Op::Register(i) => {
                            if model.insert(ids[i]) {
                                let (tx, rx) = mpsc::channel(64);
                                receivers.push(rx);
                                hub.register(ConnectionHandle::new(ids[i], tx, Arc::new(Notify::new())))
                                    .await
                                    .unwrap();
                            }
                        }
                        Op::Deregister(i) => {
                            model.remove(&ids[i]);
                            hub.deregister(ids[i]).await.unwrap();
                        }
                        Op::Broadcast => {
                            let report = hub.broadcast_with_report("p").await.unwrap();
                            let seen: HashSet<ConnectionId> = report.delivered.into_iter().collect();
                            assert_eq!(seen, model);
                            assert!(report.evicted.is_empty());
                        }
                    }
                }
            });
        }
    }
}
