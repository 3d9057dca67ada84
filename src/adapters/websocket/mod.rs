//! WebSocket adapters for realtime broadcast.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                 GET /ws  (ws_handler upgrade)                        │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │
//!                                     │ one per socket
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Connection                                   │
//! │   reader task: deadlines, size limit, optional relay                 │
//! │   writer task: outbound queue, heartbeat, single close               │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │
//!                                     │ register / deregister / broadcast
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                             Hub                                      │
//! │   live set owned by one coordination loop, evicts slow consumers     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`hub`] - Live connection set and broadcast fan-out
//! - [`connection`] - Per-connection reader and writer tasks
//! - [`messages`] - Server-originated control messages
//! - [`handler`] - Axum WebSocket upgrade handler
//! - [`transport`] - Axum socket as transport halves
//! - [`in_memory`] - In-memory transport for tests

pub mod connection;
pub mod handler;
pub mod hub;
pub mod in_memory;
pub mod messages;
pub mod transport;

pub use connection::{CloseReason, Connection, ConnectionSettings};
pub use handler::{websocket_router, ws_handler, WebSocketState};
pub use hub::{BroadcastReport, ConnectionHandle, Hub, HubError, HubHandle};
pub use in_memory::{in_memory_transport, InMemoryPeer, InMemoryReader, InMemoryWriter};
pub use messages::{ConnectedMessage, ErrorMessage, ServerMessage};
pub use transport::{split_socket, WebSocketReader, WebSocketWriter};
