//! JSON frames exchanged with the browser over `/ws/chat`.

use serde::{Deserialize, Serialize};

/// Frames accepted from the browser.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Text { message: String },
}

impl ClientMessage {
    /// Parse a text frame. Anything that is not a recognised message yields
    /// `None`; such frames are dropped rather than treated as errors.
    pub fn parse(frame: &str) -> Option<Self> {
        serde_json::from_str(frame).ok()
    }
}

/// Frames sent to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Text { text: String },
    TurnComplete,
    Error { error: String },
}

impl ServerMessage {
    pub fn to_json(&self) -> String {
        // Serializing a plain tagged enum of strings cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Text { .. } => "text",
            ServerMessage::TurnComplete => "turn_complete",
            ServerMessage::Error { .. } => "error",
        }
    }
}
