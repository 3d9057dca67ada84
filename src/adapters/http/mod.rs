//! HTTP adapters - REST endpoints and router composition.

pub mod realtime;

use ::http::HeaderValue;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::adapters::websocket::{websocket_router, ConnectionSettings, HubHandle, WebSocketState};
use crate::config::ServerConfig;

pub use realtime::{realtime_routes, RealtimeApiError, RealtimeAppState};

/// Creates the complete application router.
///
/// # Routes
/// - `GET /ws` - WebSocket upgrade
/// - `GET /health` - Liveness
/// - `POST /api/broadcast` - Push a message to every connection
pub fn build_router(
    hub: Option<HubHandle>,
    settings: ConnectionSettings,
    server: &ServerConfig,
) -> Router {
    let ws_routes = websocket_router().with_state(WebSocketState::new(hub.clone(), settings));
    let api_routes = realtime_routes().with_state(RealtimeAppState::new(hub));

    let router = Router::new().merge(ws_routes).merge(api_routes);
    let router = match build_cors_layer(server) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    // Upgraded connections leave the request future once the 101 is sent,
    // so the timeout only bounds plain requests.
    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(server.request_timeout())),
    )
}

/// CORS layer for the configured origins, or `None` when none are set.
fn build_cors_layer(server: &ServerConfig) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}
