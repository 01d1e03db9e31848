use serde::{Deserialize, Serialize};

use crate::error::MalformedPayloadError;

/// Inbound application message from a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMessage {
    pub content: String,
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, MalformedPayloadError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Chat content authored by a room member
    Message { username: String, content: String },
    /// Presence and other server-generated notices
    System { content: String },
    /// Problem with the recipient's own last frame; never broadcast
    Error { content: String },
}

impl ServerMessage {
    pub fn chat(username: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Message {
            username: username.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::Error {
            content: content.into(),
        }
    }

    /// Label used for metrics and span fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::System { .. } => "system",
            Self::Error { .. } => "error",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
