//! Integration tests for the connection hub.
//!
//! These tests drive real `Connection` tasks over in-memory transports:
//! 1. Broadcast fan-out follows register/deregister order
//! 2. Slow consumers are evicted without stalling anyone else
//! 3. Hub shutdown closes every transport exactly once

use std::time::Duration;

use portal_core::adapters::websocket::{
    in_memory_transport, CloseReason, Connection, ConnectionSettings, Hub, HubHandle, InMemoryPeer,
};
use portal_core::domain::foundation::ConnectionId;
use tokio::task::JoinHandle;

// =============================================================================
// Test Infrastructure
// =============================================================================

fn settings() -> ConnectionSettings {
    ConnectionSettings {
        outbound_capacity: 16,
        ping_period: Duration::from_secs(3600),
        read_deadline: None,
        write_deadline: Duration::from_secs(5),
        max_message_size: 4096,
        heartbeat_fail_max: 3,
        relay_inbound: false,
        send_greeting: false,
    }
}

fn start_hub() -> HubHandle {
    let (hub, handle) = Hub::new(256);
    tokio::spawn(hub.run());
    handle
}

struct Client {
    id: ConnectionId,
    peer: InMemoryPeer,
    task: JoinHandle<CloseReason>,
}

async fn connect(hub: &HubHandle, settings: ConnectionSettings) -> Client {
    let (reader, writer, peer) = in_memory_transport();
    let connection = Connection::new(reader, writer, settings);
    let id = connection.id();
    let task = tokio::spawn(connection.serve(hub.clone()));

    let live = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if hub.live_connections().await.unwrap().contains(&id) {
                return true;
            }
            if task.is_finished() {
                return false;
            }
            tokio::task::yield_now().await;
        }
    })
    .await;

    match live {
        Ok(true) => Client { id, peer, task },
        Ok(false) => panic!(
            "connection {} ended before it was live: {:?}",
            id,
            task.await.unwrap()
        ),
        Err(_) => panic!("connection {} was not live within 5s", id),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn broadcast_reaches_only_registered_connections() {
    let hub = start_hub();
    let mut a = connect(&hub, settings()).await;
    let mut b = connect(&hub, settings()).await;
    let mut c = connect(&hub, settings()).await;

    hub.broadcast("X").await.unwrap();
    hub.deregister(b.id).await.unwrap();
    hub.broadcast("Y").await.unwrap();

    assert_eq!(a.peer.next_text().await.as_deref(), Some("X"));
    assert_eq!(a.peer.next_text().await.as_deref(), Some("Y"));
    assert_eq!(c.peer.next_text().await.as_deref(), Some("X"));
    assert_eq!(c.peer.next_text().await.as_deref(), Some("Y"));

    // B saw X once, then its queue was closed before Y.
    assert!(matches!(b.task.await.unwrap(), CloseReason::Drained));
    assert_eq!(b.peer.next_text().await.as_deref(), Some("X"));
    assert_eq!(b.peer.next_text().await, None);
    assert_eq!(b.peer.close_count(), 1);

    let live = hub.live_connections().await.unwrap();
    assert_eq!(live.len(), 2);
    assert!(live.contains(&a.id) && live.contains(&c.id));
}

#[tokio::test]
async fn greeting_carries_connection_id() {
    let hub = start_hub();
    let mut client = connect(
        &hub,
        ConnectionSettings {
            send_greeting: true,
            ..settings()
        },
    )
    .await;

    let greeting: serde_json::Value =
        serde_json::from_str(&client.peer.next_text().await.unwrap()).unwrap();

    assert_eq!(greeting["type"], "connected");
    assert_eq!(greeting["connectionId"], client.id.to_string());
}

#[tokio::test]
async fn stalled_client_is_evicted_while_others_keep_receiving() {
    let hub = start_hub();
    let stalled_settings = ConnectionSettings {
        outbound_capacity: 2,
        write_deadline: Duration::from_secs(60),
        ..settings()
    };
    let stalled = connect(&hub, stalled_settings).await;
    let mut healthy = connect(&hub, settings()).await;
    stalled.peer.pause_writes();

    for i in 0..8 {
        hub.broadcast(format!("m{}", i)).await.unwrap();
    }

    for i in 0..8 {
        assert_eq!(healthy.peer.next_text().await, Some(format!("m{}", i)));
    }
    assert!(matches!(stalled.task.await.unwrap(), CloseReason::Evicted));
    assert_eq!(stalled.peer.close_count(), 1);

    let report = hub.broadcast_with_report("after").await.unwrap();
    assert_eq!(report.delivered, vec![healthy.id]);
    assert!(report.evicted.is_empty());
}

#[tokio::test]
async fn targeted_send_reaches_one_connection() {
    let hub = start_hub();
    let mut target = connect(&hub, settings()).await;
    let mut bystander = connect(&hub, settings()).await;

    assert!(hub.send_to(target.id, "just you").await.unwrap());
    hub.broadcast("everyone").await.unwrap();

    assert_eq!(target.peer.next_text().await.as_deref(), Some("just you"));
    assert_eq!(target.peer.next_text().await.as_deref(), Some("everyone"));
    assert_eq!(bystander.peer.next_text().await.as_deref(), Some("everyone"));
}

#[tokio::test]
async fn relayed_messages_reach_every_client() {
    let hub = start_hub();
    let relay = ConnectionSettings {
        relay_inbound: true,
        ..settings()
    };
    let mut speaker = connect(&hub, relay.clone()).await;
    let mut listener = connect(&hub, relay).await;

    speaker.peer.send_text("hello room");

    assert_eq!(listener.peer.next_text().await.as_deref(), Some("hello room"));
    assert_eq!(speaker.peer.next_text().await.as_deref(), Some("hello room"));
}

#[tokio::test]
async fn hub_shutdown_drains_and_closes_every_transport_once() {
    let hub = start_hub();
    let mut clients = Vec::new();
    for _ in 0..5 {
        clients.push(connect(&hub, settings()).await);
    }

    hub.broadcast("last words").await.unwrap();
    hub.shutdown();
    hub.stopped().await;

    for client in clients {
        let Client { mut peer, task, .. } = client;
        assert!(matches!(task.await.unwrap(), CloseReason::Drained));
        assert_eq!(peer.next_text().await.as_deref(), Some("last words"));
        assert_eq!(peer.close_count(), 1);
    }
    assert!(hub.broadcast("too late").await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_churn_leaves_consistent_live_set() {
    let hub = start_hub();
    // Room for every broadcast in the burst, so nobody is evicted as slow.
    let roomy = ConnectionSettings {
        outbound_capacity: 64,
        ..settings()
    };

    let mut joins = Vec::new();
    for i in 0..20 {
        let hub = hub.clone();
        let settings = roomy.clone();
        joins.push(tokio::spawn(async move {
            let client = connect(&hub, settings).await;
            hub.broadcast(format!("from {}", i)).await.unwrap();
            if i % 2 == 0 {
                client.peer.send(portal_core::ports::Frame::Close);
                client.task.await.unwrap();
                None
            } else {
                Some(client)
            }
        }));
    }

    // Survivors stay connected while their peers are held here.
    let mut survivors = Vec::new();
    for join in joins {
        if let Some(client) = join.await.unwrap() {
            survivors.push(client);
        }
    }

    let mut expected: Vec<ConnectionId> = survivors.iter().map(|client| client.id).collect();
    let mut live = hub.live_connections().await.unwrap();
    live.sort_by_key(|id| id.to_string());
    expected.sort_by_key(|id| id.to_string());
    assert_eq!(live, expected);
}
