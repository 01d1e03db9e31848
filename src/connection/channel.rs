//! In-process connection backed by tokio channels

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Connection, Frame};
use crate::error::{ClosedError, SendError};
use crate::websocket::ServerMessage;

/// Server side of an in-process connection
pub struct ChannelConnection {
    inbound: mpsc::Receiver<Frame>,
    outbound: mpsc::UnboundedSender<ServerMessage>,
}

/// Client side of an in-process connection
pub struct ChannelPeer {
    tx: Option<mpsc::Sender<Frame>>,
    rx: mpsc::UnboundedReceiver<ServerMessage>,
}

/// Create a connected pair; `capacity` bounds the client-to-server direction.
pub fn channel_pair(capacity: usize) -> (ChannelConnection, ChannelPeer) {
    let (in_tx, in_rx) = mpsc::channel(capacity.max(1));
    let (out_tx, out_rx) = mpsc::unbounded_channel();

    (
        ChannelConnection {
            inbound: in_rx,
            outbound: out_tx,
        },
        ChannelPeer {
            tx: Some(in_tx),
            rx: out_rx,
        },
    )
}

#[async_trait]
impl Connection for ChannelConnection {
    async fn send(&mut self, message: &ServerMessage) -> Result<(), SendError> {
        self.outbound
            .send(message.clone())
            .map_err(|_| SendError::new("peer dropped"))
    }

    async fn receive(&mut self) -> Result<Frame, ClosedError> {
        self.inbound
            .recv()
            .await
            .ok_or_else(|| ClosedError::new("peer disconnected"))
    }

    async fn close(&mut self) {
        self.inbound.close();
    }
}

impl ChannelPeer {
    /// Send a raw text frame
    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), SendError> {
        self.send_frame(Frame::Text(text.into())).await
    }

    /// Send `{"content": ...}`
    pub async fn send_content(&self, content: &str) -> Result<(), SendError> {
        let text = serde_json::json!({ "content": content }).to_string();
        self.send_text(text).await
    }

    pub async fn send_frame(&self, frame: Frame) -> Result<(), SendError> {
        match &self.tx {
            Some(tx) => tx
                .send(frame)
                .await
                .map_err(|_| SendError::new("connection closed")),
            None => Err(SendError::new("peer already disconnected")),
        }
    }

    /// Next record from the server; `None` once the server side is gone
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv)
    pub fn try_recv(&mut self) -> Option<ServerMessage> {
        self.rx.try_recv().ok()
    }

    /// Drop the client-to-server direction; the server observes a close
    pub fn disconnect(&mut self) {
        self.tx = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (mut conn, mut peer) = channel_pair(4);

        peer.send_content("hi").await.unwrap();
        let frame = conn.receive().await.unwrap();
        assert_eq!(frame, Frame::Text(r#"{"content":"hi"}"#.to_string()));

        conn.send(&ServerMessage::system("welcome")).await.unwrap();
        assert_eq!(peer.recv().await, Some(ServerMessage::system("welcome")));
    }

    #[tokio::test]
    async fn test_disconnect_is_observed_as_closed() {
        let (mut conn, mut peer) = channel_pair(4);
        peer.disconnect();

        let err = conn.receive().await.unwrap_err();
        assert_eq!(err.reason, "peer disconnected");
        assert!(peer.send_text("late").await.is_err());
    }

    #[tokio::test]
    async fn test_send_fails_after_peer_dropped() {
        let (mut conn, peer) = channel_pair(4);
        drop(peer);

        assert!(conn.send(&ServerMessage::system("x")).await.is_err());
    }
}
