//! HTTP handlers for the realtime endpoints.
//!
//! These handlers are thin glue over [`HubHandle`].

use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use thiserror::Error;

use crate::adapters::websocket::{HubError, HubHandle};

use super::dto::{BroadcastRequest, BroadcastResponse, ErrorResponse, HealthResponse};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for realtime endpoints.
#[derive(Clone)]
pub struct RealtimeAppState {
    /// `None` when realtime messaging is disabled.
    pub hub: Option<HubHandle>,
}

impl RealtimeAppState {
    pub fn new(hub: Option<HubHandle>) -> Self {
        Self { hub }
    }

    fn hub(&self) -> Result<&HubHandle, RealtimeApiError> {
        self.hub.as_ref().ok_or(RealtimeApiError::Unavailable)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/broadcast - Queue a text message for every live connection
pub async fn broadcast(
    State(state): State<RealtimeAppState>,
    Json(request): Json<BroadcastRequest>,
) -> Result<impl IntoResponse, RealtimeApiError> {
    if request.message.is_empty() {
        return Err(RealtimeApiError::EmptyMessage);
    }

    let hub = state.hub()?;
    let bytes = request.message.len();
    hub.broadcast(request.message).await?;

    tracing::debug!(bytes, "Broadcast queued via HTTP");
    Ok((
        StatusCode::ACCEPTED,
        Json(BroadcastResponse {
            status: "queued",
            bytes,
        }),
    ))
}

/// GET /health - Liveness and live connection count
pub async fn health(State(state): State<RealtimeAppState>) -> impl IntoResponse {
    let (realtime, connections) = match &state.hub {
        None => ("disabled", 0),
        Some(hub) => match hub.connection_count().await {
            Ok(count) => ("running", count),
            Err(HubError::Closed) => ("stopped", 0),
        },
    };

    Json(HealthResponse {
        status: "ok",
        realtime,
        connections,
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type for realtime endpoints.
#[derive(Debug, Error)]
pub enum RealtimeApiError {
    #[error("Message must not be empty")]
    EmptyMessage,

    #[error("Realtime messaging is not available")]
    Unavailable,
}

impl From<HubError> for RealtimeApiError {
    fn from(_: HubError) -> Self {
        Self::Unavailable
    }
}

impl IntoResponse for RealtimeApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_code) = match &self {
            RealtimeApiError::EmptyMessage => (StatusCode::BAD_REQUEST, "EMPTY_MESSAGE"),
            RealtimeApiError::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "HUB_UNAVAILABLE"),
        };

        let body = ErrorResponse::new(error_code, self.to_string());
        (status, Json(body)).into_response()
    }
}
