//! Voice-order transport layer
//!
//! Provides:
//! - The JSON control protocol (`t`-tagged client and server messages)
//! - A duplex message transport abstraction
//! - WebSocket (axum) and in-memory channel implementations

pub mod channel;
pub mod protocol;
pub mod traits;
pub mod websocket;

pub use channel::{ChannelPeer, ChannelTransport};
pub use protocol::{unix_ts, ClientMessage, Hello, ServerMessage};
pub use traits::{Inbound, MessageTransport};
pub use websocket::WsTransport;

use thiserror::Error;

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TransportError {
    /// Whether the connection must be terminated without finalization
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}
