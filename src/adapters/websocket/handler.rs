//! WebSocket upgrade handler for realtime connections.
//!
//! Handles the HTTP → WebSocket upgrade and hands the socket to a
//! [`Connection`], which owns it until disconnect:
//! 1. Refuse the upgrade if the hub is disabled or stopped
//! 2. Upgrade to WebSocket with the configured message size limit
//! 3. Split the socket and serve the connection against the hub

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::connection::{Connection, ConnectionSettings};
use super::hub::HubHandle;
use super::transport::split_socket;

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    /// `None` when realtime messaging is disabled.
    pub hub: Option<HubHandle>,
    pub settings: ConnectionSettings,
}

impl WebSocketState {
    pub fn new(hub: Option<HubHandle>, settings: ConnectionSettings) -> Self {
        Self { hub, settings }
    }

    /// The hub, if it is configured and still running.
    pub fn live_hub(&self) -> Option<&HubHandle> {
        self.hub.as_ref().filter(|hub| !hub.is_closed())
    }
}

/// Handle WebSocket upgrade requests.
///
/// Route: `GET /ws`
pub async fn ws_handler(
    State(state): State<WebSocketState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(hub) = state.live_hub().cloned() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "Realtime messaging is not available",
        )
            .into_response();
    };

    let ws = match upgrade {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let settings = state.settings.clone();
    ws.max_message_size(settings.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, hub, settings))
}

async fn handle_socket(socket: WebSocket, hub: HubHandle, settings: ConnectionSettings) {
    let (reader, writer) = split_socket(socket);
    let connection = Connection::new(reader, writer, settings);
    let id = connection.id();

    tracing::debug!(connection_id = %id, "WebSocket connection opened");
    connection.serve(hub).await;
}

/// Create axum router for the WebSocket endpoint.
///
/// # Example
///
/// ```ignore
/// let app = Router::new()
///     .merge(websocket_router().with_state(ws_state));
/// ```
pub fn websocket_router() -> axum::Router<WebSocketState> {
    use axum::routing::get;

    axum::Router::new().route("/ws", get(ws_handler))
}
