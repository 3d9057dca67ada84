//! WebSocket message types sent by the server itself.
//!
//! Broadcast payloads are delivered verbatim; only the messages the hub
//! generates on its own (greeting, errors) have a JSON envelope:
//! - `connected` - first message on a new connection, carries its id
//! - `error` - sent before the server closes a connection it cannot serve

use serde::Serialize;

use crate::domain::foundation::{ConnectionId, Timestamp};
use crate::domain::realtime::Payload;

/// All message types the server generates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection registered with the hub.
    Connected(ConnectedMessage),

    /// Error occurred.
    Error(ErrorMessage),
}

/// Sent when a connection has been registered.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedMessage {
    pub connection_id: String,
    pub timestamp: String,
}

/// Error message sent to client.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorMessage {
    pub code: String,
    pub message: String,
    pub timestamp: String,
}

impl ServerMessage {
    /// Greeting for a freshly registered connection.
    pub fn connected(id: ConnectionId) -> Self {
        ServerMessage::Connected(ConnectedMessage {
            connection_id: id.to_string(),
            timestamp: Timestamp::now().to_rfc3339(),
        })
    }

    /// Error notice.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorMessage {
            code: code.into(),
            message: message.into(),
            timestamp: Timestamp::now().to_rfc3339(),
        })
    }

    /// JSON text payload for this message.
    pub fn to_payload(&self) -> Result<Payload, serde_json::Error> {
        serde_json::to_string(self).map(Payload::text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connected_message_serializes_with_type_tag() {
        let id: ConnectionId = "550e8400-e29b-41d4-a716-446655440000".parse().unwrap();
        let payload = ServerMessage::connected(id).to_payload().unwrap();

        let json = payload.as_text().unwrap();
        assert!(json.contains(r#""type":"connected""#));
        assert!(json.contains(r#""connectionId":"550e8400-e29b-41d4-a716-446655440000""#));
    }

    #[test]
    fn error_message_serializes_correctly() {
        let msg = ServerMessage::Error(ErrorMessage {
            code: "HUB_UNAVAILABLE".to_string(),
            message: "Realtime messaging is shutting down".to_string(),
            timestamp: "2025-01-10T00:00:00Z".to_string(),
        });

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains(r#""code":"HUB_UNAVAILABLE""#));
    }
}
