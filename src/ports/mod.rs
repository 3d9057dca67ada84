//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the core and the outside world. Adapters implement these ports.
//!
//! ## Transport Ports
//!
//! - `TransportReader` - Inbound half of a realtime connection
//! - `TransportWriter` - Outbound half of a realtime connection

mod transport;

pub use transport::{Frame, TransportError, TransportReader, TransportWriter};
