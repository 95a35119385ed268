//! Transport traits
//!
//! Abstract interface over a persistent duplex connection carrying JSON
//! control messages and binary audio frames.

use async_trait::async_trait;

use crate::protocol::ServerMessage;
use crate::TransportError;

/// Frame received from the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// JSON control message
    Text(String),
    /// Raw PCM audio
    Binary(Vec<u8>),
}

/// Duplex message transport for one connection
#[async_trait]
pub trait MessageTransport: Send {
    /// Next inbound frame; `None` once the peer has gone away.
    ///
    /// Must be cancel-safe: it is raced against deadlines.
    async fn recv(&mut self) -> Option<Result<Inbound, TransportError>>;

    /// Send a control message
    async fn send(&mut self, message: &ServerMessage) -> Result<(), TransportError>;

    /// Close the connection; errors are ignored
    async fn close(&mut self);
}
