//! HTTP adapter for realtime endpoints.
//!
//! - `GET /health` - Liveness and live connection count
//! - `POST /api/broadcast` - Queue a text message for every live connection

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{RealtimeApiError, RealtimeAppState};
pub use routes::realtime_routes;
