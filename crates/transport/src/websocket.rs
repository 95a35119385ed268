//! WebSocket transport over axum

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};

use crate::protocol::ServerMessage;
use crate::traits::{Inbound, MessageTransport};
use crate::TransportError;

/// Adapts an upgraded axum WebSocket
pub struct WsTransport {
    socket: WebSocket,
    closed: bool,
}

impl WsTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self {
            socket,
            closed: false,
        }
    }
}

#[async_trait]
impl MessageTransport for WsTransport {
    async fn recv(&mut self) -> Option<Result<Inbound, TransportError>> {
        if self.closed {
            return None;
        }
        loop {
            match self.socket.recv().await? {
                Ok(Message::Text(text)) => return Some(Ok(Inbound::Text(text))),
                Ok(Message::Binary(data)) => return Some(Ok(Inbound::Binary(data))),
                // Pings are answered by the protocol layer
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Ok(Message::Close(frame)) => {
                    tracing::debug!(?frame, "Client closed WebSocket");
                    self.closed = true;
                    return None;
                }
                Err(e) => {
                    self.closed = true;
                    return Some(Err(TransportError::ConnectionLost(e.to_string())));
                }
            }
        }
    }

    async fn send(&mut self, message: &ServerMessage) -> Result<(), TransportError> {
        let json = serde_json::to_string(message)?;
        self.socket
            .send(Message::Text(json))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.socket.send(Message::Close(None)).await;
        }
    }
}
