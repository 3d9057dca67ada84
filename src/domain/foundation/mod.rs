//! Foundation module - Shared domain primitives.
//!
//! Contains the identifiers, value objects and error types
//! shared by the realtime and lifecycle modules.

mod errors;
mod ids;
mod timestamp;

pub use errors::ValidationError;
pub use ids::ConnectionId;
pub use timestamp::Timestamp;
