//! Transport-level connection abstraction.
//!
//! A [`Connection`] is one bidirectional frame stream owned by exactly one
//! session. The WebSocket adapter lives in [`crate::websocket`]; the
//! in-process [`channel`] pair is used by tests and embedded clients.

pub mod channel;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{ClosedError, SendError};
use crate::websocket::ServerMessage;

pub use channel::{channel_pair, ChannelConnection, ChannelPeer};

/// Identifies one accepted connection for its whole lifetime
pub type ConnectionId = Uuid;

/// An inbound application frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

#[async_trait]
pub trait Connection: Send {
    /// Deliver one record to the peer.
    async fn send(&mut self, message: &ServerMessage) -> Result<(), SendError>;

    /// Wait for the next application frame.
    ///
    /// Must be cancel-safe: the session loop races it against its outbound
    /// queue and drops the future when the other branch wins.
    async fn receive(&mut self) -> Result<Frame, ClosedError>;

    /// Best-effort close of the underlying transport.
    async fn close(&mut self) {}
}
