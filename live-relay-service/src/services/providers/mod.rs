//! Live API provider abstractions and implementations.
//!
//! The relay and the token issuer only see the [`LiveProvider`] trait, so the
//! Gemini backend can be swapped for the mock in tests.

pub mod gemini;
pub mod mock;

use crate::models::{EphemeralToken, TokenMode};
use async_trait::async_trait;
use std::pin::Pin;
use thiserror::Error;
use tokio_stream::Stream;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Session closed")]
    SessionClosed,
}

/// One event received from an upstream Live session.
///
/// An event may carry model text, a turn-complete signal, both, or neither
/// (tool calls, usage updates, setup acks and the like).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionEvent {
    pub text: Option<String>,
    pub turn_complete: bool,
}

impl SessionEvent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            turn_complete: false,
        }
    }

    pub fn turn_complete() -> Self {
        Self {
            text: None,
            turn_complete: true,
        }
    }
}

/// Stream of events from an upstream session. Ends when the session closes.
pub type SessionEventStream =
    Pin<Box<dyn Stream<Item = Result<SessionEvent, ProviderError>> + Send>>;

/// Write half of an upstream Live session.
#[async_trait]
pub trait SessionSender: Send {
    /// Send one complete user turn (`turn_complete = true`).
    async fn send_turn(&mut self, text: &str) -> Result<(), ProviderError>;

    /// Close the session. Called exactly once by the owner.
    async fn close(&mut self) -> Result<(), ProviderError>;
}

/// An open upstream session, split into its two directions.
pub struct LiveSession {
    pub sender: Box<dyn SessionSender>,
    pub events: SessionEventStream,
}

/// Trait for Live API providers (e.g., Gemini).
#[async_trait]
pub trait LiveProvider: Send + Sync {
    /// Mint a single-use ephemeral token constrained for `mode`.
    async fn mint_token(&self, mode: TokenMode) -> Result<EphemeralToken, ProviderError>;

    /// Open a text-only streaming session.
    ///
    /// Resolves once the provider has acknowledged the session setup.
    async fn open_session(&self) -> Result<LiveSession, ProviderError>;
}
