//! Adapters - Implementations of port interfaces and process boundaries.
//!
//! Adapters connect the domain to external systems:
//! - `websocket` - Connection hub, per-connection tasks, socket transports
//! - `shutdown` - Termination signals driving cleanup callbacks
//! - `http` - REST endpoints and router composition

pub mod http;
pub mod shutdown;
pub mod websocket;

pub use http::build_router;
pub use shutdown::{ShutdownTrigger, ShutdownWatcher, TerminationSignal};
pub use websocket::{Connection, ConnectionSettings, Hub, HubHandle};
