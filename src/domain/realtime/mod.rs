//! Realtime module - values carried through the connection hub.

mod payload;

pub use payload::Payload;
