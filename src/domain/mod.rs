//! Domain layer containing the core types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (identifiers, timestamps, errors)
//! - `lifecycle` - Topic-addressed cleanup callbacks for orderly shutdown
//! - `realtime` - Payloads fanned out by the connection hub

pub mod foundation;
pub mod lifecycle;
pub mod realtime;
