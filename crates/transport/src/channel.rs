//! In-memory transport backed by tokio channels
//!
//! Used by tests and for embedding the pipeline behind another front end.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::traits::{Inbound, MessageTransport};
use crate::TransportError;

/// Server side of an in-memory connection
pub struct ChannelTransport {
    inbound: mpsc::Receiver<Inbound>,
    outbound: mpsc::UnboundedSender<ServerMessage>,
}

/// Client side of an in-memory connection
pub struct ChannelPeer {
    inbound: Option<mpsc::Sender<Inbound>>,
    outbound: mpsc::UnboundedReceiver<ServerMessage>,
}

impl ChannelTransport {
    /// Connected transport/peer pair
    pub fn pair(capacity: usize) -> (ChannelTransport, ChannelPeer) {
        let (in_tx, in_rx) = mpsc::channel(capacity.max(1));
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        (
            ChannelTransport {
                inbound: in_rx,
                outbound: out_tx,
            },
            ChannelPeer {
                inbound: Some(in_tx),
                outbound: out_rx,
            },
        )
    }
}

#[async_trait]
impl MessageTransport for ChannelTransport {
    async fn recv(&mut self) -> Option<Result<Inbound, TransportError>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn send(&mut self, message: &ServerMessage) -> Result<(), TransportError> {
        self.outbound
            .send(message.clone())
            .map_err(|_| TransportError::Send("peer dropped".to_string()))
    }

    async fn close(&mut self) {
        self.inbound.close();
    }
}

impl ChannelPeer {
    /// Send a control message
    pub async fn send_message(&self, message: &ClientMessage) -> Result<(), TransportError> {
        let json = serde_json::to_string(message)?;
        self.send_text(json).await
    }

    /// Send a raw text frame
    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.send(Inbound::Text(text.into())).await
    }

    /// Send an audio frame
    pub async fn send_audio(&self, pcm: Vec<u8>) -> Result<(), TransportError> {
        self.send(Inbound::Binary(pcm)).await
    }

    async fn send(&self, frame: Inbound) -> Result<(), TransportError> {
        let tx = self
            .inbound
            .as_ref()
            .ok_or_else(|| TransportError::ConnectionLost("peer disconnected".to_string()))?;
        tx.send(frame)
            .await
            .map_err(|_| TransportError::ConnectionLost("server closed".to_string()))
    }

    /// Next message from the server; `None` once the server side is gone
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        self.outbound.recv().await
    }

    /// Drain every message the server sent before closing
    pub async fn collect(mut self) -> Vec<ServerMessage> {
        self.inbound = None;
        let mut messages = Vec::new();
        while let Some(msg) = self.outbound.recv().await {
            messages.push(msg);
        }
        messages
    }

    /// Simulate the client going away; the server sees end of stream
    pub fn disconnect(&mut self) {
        self.inbound = None;
    }

    /// Stop reading server messages; later sends fail on the server side
    pub fn stop_reading(&mut self) {
        self.outbound.close();
    }
}
