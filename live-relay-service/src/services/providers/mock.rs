//! Mock provider implementation for testing.

use super::{LiveProvider, LiveSession, ProviderError, SessionEvent, SessionSender};
use crate::config::DEFAULT_TOKEN_MODEL;
use crate::models::{EphemeralToken, TokenGrant, TokenMode};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

type EventSender = mpsc::UnboundedSender<Result<SessionEvent, ProviderError>>;

/// Shared record of everything the relay did against the mock.
#[derive(Debug, Clone, Default)]
pub struct MockRecorder {
    turns: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
    sessions_opened: Arc<AtomicUsize>,
    tokens_minted: Arc<AtomicUsize>,
}

impl MockRecorder {
    /// User turns forwarded upstream, in order.
    pub fn turns(&self) -> Vec<String> {
        self.turns.lock().map(|t| t.clone()).unwrap_or_default()
    }

    /// Number of `close` calls across all sessions.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn tokens_minted(&self) -> usize {
        self.tokens_minted.load(Ordering::SeqCst)
    }

    fn record_turn(&self, text: &str) {
        if let Ok(mut turns) = self.turns.lock() {
            turns.push(text.to_string());
        }
    }
}

/// Mock Live provider.
///
/// Every forwarded turn is answered with an ignorable event, a text event
/// (`"Mock reply: <turn>"`) and a turn-complete event.
#[derive(Debug, Default)]
pub struct MockLiveProvider {
    mint_failure: Option<String>,
    open_failure: Option<String>,
    failure_trigger: Option<String>,
    end_trigger: Option<String>,
    recorder: MockRecorder,
}

impl MockLiveProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `mint_token` fail with an API error carrying `message`.
    pub fn with_mint_failure(mut self, message: impl Into<String>) -> Self {
        self.mint_failure = Some(message.into());
        self
    }

    /// Make `open_session` fail with an API error carrying `message`.
    pub fn with_open_failure(mut self, message: impl Into<String>) -> Self {
        self.open_failure = Some(message.into());
        self
    }

    /// Fail the upstream event stream when a turn equal to `trigger` arrives.
    pub fn with_upstream_failure_on(mut self, trigger: impl Into<String>) -> Self {
        self.failure_trigger = Some(trigger.into());
        self
    }

    /// End the upstream event stream when a turn equal to `trigger` arrives.
    pub fn with_upstream_end_on(mut self, trigger: impl Into<String>) -> Self {
        self.end_trigger = Some(trigger.into());
        self
    }

    pub fn recorder(&self) -> MockRecorder {
        self.recorder.clone()
    }
}

#[async_trait]
impl LiveProvider for MockLiveProvider {
    async fn mint_token(&self, mode: TokenMode) -> Result<EphemeralToken, ProviderError> {
        if let Some(message) = &self.mint_failure {
            return Err(ProviderError::ApiError(message.clone()));
        }

        let grant = TokenGrant::new(mode, DEFAULT_TOKEN_MODEL, Utc::now());
        self.recorder.tokens_minted.fetch_add(1, Ordering::SeqCst);

        Ok(EphemeralToken {
            name: format!("auth_tokens/mock-{}", Uuid::new_v4()),
            model: grant.model,
            expire_time: grant.expire_time,
            new_session_expire_time: grant.new_session_expire_time,
        })
    }

    async fn open_session(&self) -> Result<LiveSession, ProviderError> {
        if let Some(message) = &self.open_failure {
            return Err(ProviderError::ApiError(message.clone()));
        }

        self.recorder.sessions_opened.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();

        Ok(LiveSession {
            sender: Box::new(MockSessionSender {
                events: Some(tx),
                failure_trigger: self.failure_trigger.clone(),
                end_trigger: self.end_trigger.clone(),
                recorder: self.recorder.clone(),
            }),
            events: Box::pin(UnboundedReceiverStream::new(rx)),
        })
    }
}

struct MockSessionSender {
    /// Dropped on close, which ends the event stream.
    events: Option<EventSender>,
    failure_trigger: Option<String>,
    end_trigger: Option<String>,
    recorder: MockRecorder,
}

#[async_trait]
impl SessionSender for MockSessionSender {
    async fn send_turn(&mut self, text: &str) -> Result<(), ProviderError> {
        let Some(events) = &self.events else {
            return Err(ProviderError::SessionClosed);
        };

        self.recorder.record_turn(text);

        if self.end_trigger.as_deref() == Some(text) {
            self.events.take();
            return Ok(());
        }

        if self.failure_trigger.as_deref() == Some(text) {
            let _ = events.send(Err(ProviderError::NetworkError(
                "mock upstream failure".to_string(),
            )));
            return Ok(());
        }

        for event in [
            SessionEvent::default(),
            SessionEvent::text(format!("Mock reply: {}", text)),
            SessionEvent::turn_complete(),
        ] {
            let _ = events.send(Ok(event));
        }

        Ok(())
    }

    async fn close(&mut self) -> Result<(), ProviderError> {
        self.recorder.closes.fetch_add(1, Ordering::SeqCst);
        self.events.take();
        Ok(())
    }
}
