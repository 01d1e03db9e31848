//! Axum WebSocket adapter for [`Connection`]

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket};

use crate::connection::{Connection, Frame};
use crate::error::{ClosedError, SendError};

use super::ServerMessage;

/// Normal closure status code
const CLOSE_NORMAL: u16 = 1000;

pub struct WsConnection {
    socket: WebSocket,
}

impl WsConnection {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn send(&mut self, message: &ServerMessage) -> Result<(), SendError> {
        let text = message
            .to_json()
            .map_err(|e| SendError::new(format!("serialization failed: {}", e)))?;

        self.socket
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| SendError::new(e.to_string()))
    }

    async fn receive(&mut self) -> Result<Frame, ClosedError> {
        while let Some(result) = self.socket.recv().await {
            match result {
                Ok(Message::Text(text)) => return Ok(Frame::Text(text.as_str().to_owned())),
                Ok(Message::Binary(data)) => return Ok(Frame::Binary(data.to_vec())),
                // Axum answers pings itself
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Ok(Message::Close(frame)) => {
                    let reason = frame
                        .map(|f| format!("close frame {}", f.code))
                        .unwrap_or_else(|| "close frame".to_string());
                    tracing::debug!(reason = %reason, "Received close frame");
                    return Err(ClosedError::new(reason));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "WebSocket receive error");
                    return Err(ClosedError::new(e.to_string()));
                }
            }
        }
        Err(ClosedError::new("stream ended"))
    }

    async fn close(&mut self) {
        let frame = CloseFrame {
            code: CLOSE_NORMAL,
            reason: "".into(),
        };
        if let Err(e) = self.socket.send(Message::Close(Some(frame))).await {
            tracing::debug!(error = %e, "Close frame not delivered");
        }
    }
}
