//! Axum router configuration for realtime endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{broadcast, health, RealtimeAppState};

/// Create the realtime API router.
///
/// # Routes
/// - `GET /health` - Liveness and live connection count
/// - `POST /api/broadcast` - Queue a message for every live connection
pub fn realtime_routes() -> Router<RealtimeAppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/broadcast", post(broadcast))
}
