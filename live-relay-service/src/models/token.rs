//! Ephemeral token models.
//!
//! A token is minted per request, never mutated, and consumed by the browser
//! when it opens its own direct Live session with the provider.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Number of session starts a token permits.
pub const TOKEN_USES: u32 = 1;

/// Absolute lifetime of a token from issuance.
pub const TOKEN_TTL_MINUTES: i64 = 30;

/// Window after issuance in which the token may start a new session.
pub const NEW_SESSION_WINDOW_MINUTES: i64 = 5;

/// System instruction baked into every minted token.
pub const TOKEN_SYSTEM_INSTRUCTION: &str =
    "You are a helpful AI assistant. Be friendly, conversational, and concise in your responses.";

fn default_mode() -> String {
    "audio".to_string()
}

/// Body of `POST /api/token`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    #[serde(default = "default_mode")]
    pub mode: String,
}

/// Successful response of `POST /api/token`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub token: String,
    pub model: String,
    pub mode: String,
}

/// Interaction mode requested by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenMode {
    Text,
    Audio,
}

impl TokenMode {
    /// Lenient parse: only `"audio"` selects audio, anything else is text.
    pub fn from_request(mode: &str) -> Self {
        if mode == "audio" {
            TokenMode::Audio
        } else {
            TokenMode::Text
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenMode::Text => "text",
            TokenMode::Audio => "audio",
        }
    }
}

/// Response modality as named by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Text,
    Audio,
}

/// The constraints embedded in a token: who may connect, until when, and
/// with what session configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenGrant {
    pub uses: u32,
    pub expire_time: DateTime<Utc>,
    pub new_session_expire_time: DateTime<Utc>,
    pub model: String,
    pub response_modalities: Vec<Modality>,
    pub system_instruction: String,
    pub input_audio_transcription: bool,
    pub output_audio_transcription: bool,
}

impl TokenGrant {
    pub fn new(mode: TokenMode, model: &str, issued_at: DateTime<Utc>) -> Self {
        let audio = mode == TokenMode::Audio;

        Self {
            uses: TOKEN_USES,
            expire_time: issued_at + Duration::minutes(TOKEN_TTL_MINUTES),
            new_session_expire_time: issued_at + Duration::minutes(NEW_SESSION_WINDOW_MINUTES),
            model: model.to_string(),
            response_modalities: if audio {
                vec![Modality::Audio]
            } else {
                vec![Modality::Text]
            },
            system_instruction: TOKEN_SYSTEM_INSTRUCTION.to_string(),
            input_audio_transcription: true,
            output_audio_transcription: audio,
        }
    }
}

/// A minted token as returned by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct EphemeralToken {
    /// Opaque token identifier handed to the browser.
    pub name: String,
    pub model: String,
    pub expire_time: DateTime<Utc>,
    pub new_session_expire_time: DateTime<Utc>,
}
