//! Gemini Live provider implementation.
//!
//! Ephemeral tokens are minted through the `v1alpha` REST `auth_tokens`
//! endpoint. Relayed sessions speak the `BidiGenerateContent` WebSocket
//! protocol directly: one `setup` frame, a `setupComplete` ack, then
//! `clientContent` turns up and `serverContent` events down.

use super::{
    LiveProvider, LiveSession, ProviderError, SessionEvent, SessionEventStream, SessionSender,
};
use crate::models::{EphemeralToken, Modality, TokenGrant, TokenMode};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Ephemeral token endpoint (only available on `v1alpha`).
pub const GEMINI_AUTH_TOKENS_URL: &str =
    "https://generativelanguage.googleapis.com/v1alpha/auth_tokens";

/// Live API WebSocket endpoint.
pub const GEMINI_LIVE_WS_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// System instruction for relayed text sessions.
pub const SESSION_SYSTEM_INSTRUCTION: &str =
    "You are a helpful AI assistant. Be friendly and conversational.";

/// Upper bound for connecting and receiving `setupComplete`.
const SETUP_TIMEOUT: Duration = Duration::from_secs(30);

type LiveSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub token_model: String,
    pub live_model: String,
    pub auth_tokens_url: String,
    pub live_url: String,
}

impl GeminiConfig {
    pub fn new(
        api_key: impl Into<String>,
        token_model: impl Into<String>,
        live_model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            token_model: token_model.into(),
            live_model: live_model.into(),
            auth_tokens_url: GEMINI_AUTH_TOKENS_URL.to_string(),
            live_url: GEMINI_LIVE_WS_URL.to_string(),
        }
    }
}

/// Gemini Live provider.
pub struct GeminiLiveProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiLiveProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    async fn connect(&self) -> Result<LiveSession, ProviderError> {
        let url = format!("{}?key={}", self.config.live_url, self.config.api_key);
        let (socket, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let (mut write, mut read) = socket.split();

        let setup = LiveClientMessage::Setup(SessionSetup::for_relay(&self.config.live_model));
        send_frame(&mut write, &setup).await?;
        await_setup_complete(&mut read).await?;

        Ok(LiveSession {
            sender: Box::new(GeminiSessionSender {
                sink: write,
                closed: false,
            }),
            events: event_stream(read),
        })
    }
}

#[async_trait]
impl LiveProvider for GeminiLiveProvider {
    async fn mint_token(&self, mode: TokenMode) -> Result<EphemeralToken, ProviderError> {
        let grant = TokenGrant::new(mode, &self.config.token_model, Utc::now());
        let request = AuthTokenRequest::from(&grant);

        tracing::debug!(
            model = %grant.model,
            mode = mode.as_str(),
            "Requesting ephemeral token from Gemini API"
        );

        let response = self
            .client
            .post(&self.config.auth_tokens_url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited(error_text));
            }

            return Err(ProviderError::ApiError(format!(
                "Gemini API error {}: {}",
                status, error_text
            )));
        }

        let token: AuthTokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;

        Ok(EphemeralToken {
            name: token.name,
            model: grant.model,
            expire_time: grant.expire_time,
            new_session_expire_time: grant.new_session_expire_time,
        })
    }

    async fn open_session(&self) -> Result<LiveSession, ProviderError> {
        tracing::debug!(model = %self.config.live_model, "Opening Gemini Live session");

        tokio::time::timeout(SETUP_TIMEOUT, self.connect())
            .await
            .map_err(|_| {
                ProviderError::NetworkError(format!(
                    "Live session setup timed out after {:?}",
                    SETUP_TIMEOUT
                ))
            })?
    }
}

/// Write half of a Gemini Live socket.
struct GeminiSessionSender {
    sink: SplitSink<LiveSocket, Message>,
    closed: bool,
}

#[async_trait]
impl SessionSender for GeminiSessionSender {
    async fn send_turn(&mut self, text: &str) -> Result<(), ProviderError> {
        if self.closed {
            return Err(ProviderError::SessionClosed);
        }

        let turn = LiveClientMessage::ClientContent(ClientContent {
            turns: vec![Content::user_text(text)],
            turn_complete: true,
        });
        send_frame(&mut self.sink, &turn).await
    }

    async fn close(&mut self) -> Result<(), ProviderError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        match self.sink.close().await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(ProviderError::NetworkError(e.to_string())),
        }
    }
}

async fn send_frame(
    sink: &mut SplitSink<LiveSocket, Message>,
    frame: &LiveClientMessage,
) -> Result<(), ProviderError> {
    let json = serde_json::to_string(frame)
        .map_err(|e| ProviderError::ProtocolError(format!("Failed to encode frame: {}", e)))?;

    sink.send(Message::Text(json))
        .await
        .map_err(|e| ProviderError::NetworkError(e.to_string()))
}

/// Read frames until the server acknowledges the setup.
async fn await_setup_complete(read: &mut SplitStream<LiveSocket>) -> Result<(), ProviderError> {
    while let Some(frame) = read.next().await {
        let frame = frame.map_err(|e| ProviderError::NetworkError(e.to_string()))?;
        let payload = match frame {
            Message::Text(text) => text.into_bytes(),
            Message::Binary(bytes) => bytes,
            Message::Close(close) => {
                let reason = close
                    .as_ref()
                    .map(describe_close)
                    .unwrap_or_else(|| "no reason given".to_string());
                return Err(ProviderError::ApiError(format!(
                    "Live session rejected during setup: {}",
                    reason
                )));
            }
            _ => continue,
        };

        if let Some(message) = decode_server_frame(&payload) {
            if message.setup_complete.is_some() {
                return Ok(());
            }
        }
    }

    Err(ProviderError::SessionClosed)
}

/// Adapt the read half into a stream of [`SessionEvent`]s.
///
/// A normal close (1000, or no close frame) ends the stream. Any other close
/// code is yielded once as [`ProviderError::ApiError`] before the stream
/// ends; transport errors are yielded as [`ProviderError::NetworkError`].
fn event_stream(read: SplitStream<LiveSocket>) -> SessionEventStream {
    let events = stream::unfold(Some(read), |state| async move {
        let mut read = state?;
        loop {
            let frame = match read.next().await? {
                Ok(frame) => frame,
                Err(e) => {
                    return Some((Err(ProviderError::NetworkError(e.to_string())), Some(read)))
                }
            };

            let payload = match frame {
                Message::Text(text) => text.into_bytes(),
                Message::Binary(bytes) => bytes,
                Message::Close(Some(close)) if close.code != CloseCode::Normal => {
                    let reason = describe_close(&close);
                    tracing::warn!(reason = %reason, "Gemini Live session closed with an error");
                    return Some((
                        Err(ProviderError::ApiError(format!(
                            "Live session closed by server: {}",
                            reason
                        ))),
                        None,
                    ));
                }
                Message::Close(close) => {
                    let reason = close.map(|c| c.reason.to_string()).unwrap_or_default();
                    tracing::info!(reason = %reason, "Gemini Live session closed by server");
                    return None;
                }
                _ => continue,
            };

            let event = match decode_server_frame(&payload) {
                Some(message) => SessionEvent::from(message),
                None => SessionEvent::default(),
            };
            return Some((Ok(event), Some(read)));
        }
    });

    Box::pin(events)
}

fn describe_close(close: &CloseFrame<'_>) -> String {
    format!("{} ({})", close.reason, u16::from(close.code))
}

fn decode_server_frame(payload: &[u8]) -> Option<LiveServerMessage> {
    match serde_json::from_slice::<LiveServerMessage>(payload) {
        Ok(message) => {
            if let Some(go_away) = &message.go_away {
                tracing::warn!(time_left = ?go_away.time_left, "Gemini Live server is going away");
            }
            Some(message)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring undecodable Live frame");
            None
        }
    }
}

fn model_resource(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

impl From<LiveServerMessage> for SessionEvent {
    fn from(message: LiveServerMessage) -> Self {
        let Some(content) = message.server_content else {
            return SessionEvent::default();
        };

        let text = content.model_turn.and_then(|turn| {
            let mut texts = turn
                .parts
                .into_iter()
                .filter(|p| p.thought != Some(true))
                .filter_map(|p| p.text)
                .peekable();
            texts.peek()?;
            Some(texts.collect::<String>())
        });

        if content.interrupted {
            tracing::debug!("Gemini Live generation interrupted");
        }

        SessionEvent {
            text,
            turn_complete: content.turn_complete,
        }
    }
}

// ============================================================================
// Gemini Live API Request/Response Types
// ============================================================================

/// Serializes as `{}`; the API uses empty objects to switch features on.
#[derive(Debug, Clone, Default, Serialize)]
struct Enabled {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthTokenRequest {
    uses: u32,
    expire_time: DateTime<Utc>,
    new_session_expire_time: DateTime<Utc>,
    bidi_generate_content_setup: SessionSetup,
}

impl From<&TokenGrant> for AuthTokenRequest {
    fn from(grant: &TokenGrant) -> Self {
        Self {
            uses: grant.uses,
            expire_time: grant.expire_time,
            new_session_expire_time: grant.new_session_expire_time,
            bidi_generate_content_setup: SessionSetup {
                model: model_resource(&grant.model),
                generation_config: LiveGenerationConfig {
                    response_modalities: grant.response_modalities.clone(),
                },
                system_instruction: Content::system_text(&grant.system_instruction),
                session_resumption: Some(Enabled::default()),
                input_audio_transcription: grant.input_audio_transcription.then(Enabled::default),
                output_audio_transcription: grant
                    .output_audio_transcription
                    .then(Enabled::default),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthTokenResponse {
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum LiveClientMessage {
    Setup(SessionSetup),
    ClientContent(ClientContent),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionSetup {
    model: String,
    generation_config: LiveGenerationConfig,
    system_instruction: Content,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_resumption: Option<Enabled>,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_audio_transcription: Option<Enabled>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_audio_transcription: Option<Enabled>,
}

impl SessionSetup {
    fn for_relay(model: &str) -> Self {
        Self {
            model: model_resource(model),
            generation_config: LiveGenerationConfig {
                response_modalities: vec![Modality::Text],
            },
            system_instruction: Content::system_text(SESSION_SYSTEM_INSTRUCTION),
            session_resumption: None,
            input_audio_transcription: None,
            output_audio_transcription: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LiveGenerationConfig {
    response_modalities: Vec<Modality>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientContent {
    turns: Vec<Content>,
    turn_complete: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn user_text(text: &str) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part::text(text)],
        }
    }

    fn system_text(text: &str) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            thought: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveServerMessage {
    #[serde(default)]
    setup_complete: Option<serde_json::Value>,
    #[serde(default)]
    server_content: Option<ServerContent>,
    #[serde(default)]
    go_away: Option<GoAway>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
    #[serde(default)]
    model_turn: Option<Content>,
    #[serde(default)]
    turn_complete: bool,
    #[serde(default)]
    interrupted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoAway {
    #[serde(default)]
    time_left: Option<String>,
}
