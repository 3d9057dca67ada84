//! Axum WebSocket implementation of the transport ports.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};

use crate::ports::{Frame, TransportError, TransportReader, TransportWriter};

/// Splits an upgraded socket into transport halves.
pub fn split_socket(socket: WebSocket) -> (WebSocketReader, WebSocketWriter) {
    let (sink, stream) = socket.split();
    (WebSocketReader { stream }, WebSocketWriter { sink })
}

pub struct WebSocketReader {
    stream: SplitStream<WebSocket>,
}

#[async_trait]
impl TransportReader for WebSocketReader {
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        let message = self.stream.next().await?;
        Some(
            message
                .map(Frame::from)
                .map_err(|e| TransportError::Protocol(e.to_string())),
        )
    }
}

pub struct WebSocketWriter {
    sink: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl TransportWriter for WebSocketWriter {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        self.sink
            .send(Message::from(frame))
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        // Sends a close frame if the peer is still there.
        self.sink
            .close()
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))
    }
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(text) => Frame::Text(text),
            Message::Binary(bytes) => Frame::Binary(bytes),
            Message::Ping(bytes) => Frame::Ping(bytes),
            Message::Pong(bytes) => Frame::Pong(bytes),
            Message::Close(_) => Frame::Close,
        }
    }
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(bytes) => Message::Binary(bytes),
            Frame::Ping(bytes) => Message::Ping(bytes),
            Frame::Pong(bytes) => Message::Pong(bytes),
            Frame::Close => Message::Close(None),
        }
    }
}
