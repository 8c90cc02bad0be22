//! Bidirectional relay between a browser chat socket and a Live session.
//!
//! One upstream session is opened per client connection. While active, two
//! pumps run in the same task:
//!
//! * inbound: client text frames -> upstream user turns
//! * outbound: upstream events -> client `text` / `turn_complete` frames
//!
//! The first pump to finish decides the exit; the other is dropped before the
//! session is closed, so the session is closed exactly once on every path.

use crate::models::{ClientMessage, ServerMessage};
use crate::services::metrics;
use crate::services::providers::{
    LiveProvider, LiveSession, ProviderError, SessionEvent, SessionEventStream, SessionSender,
};
use axum::extract::ws::{close_code, CloseFrame, Message};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::borrow::Cow;
use std::fmt::Display;

/// Why a pump stopped.
#[derive(Debug)]
pub enum PumpExit {
    /// The client sent a close frame or its stream ended.
    ClientDisconnected,
    /// Reading from or writing to the client socket failed.
    ClientFailed(String),
    /// The upstream event stream ended.
    UpstreamClosed,
    /// The upstream session reported a transport or protocol failure.
    UpstreamFailed(ProviderError),
}

impl PumpExit {
    fn outcome(&self) -> &'static str {
        match self {
            PumpExit::ClientDisconnected => "client_disconnected",
            PumpExit::ClientFailed(_) => "client_failed",
            PumpExit::UpstreamClosed => "upstream_closed",
            PumpExit::UpstreamFailed(_) => "upstream_failed",
        }
    }
}

/// Final state of one relayed connection.
#[derive(Debug)]
pub enum RelayOutcome {
    /// The upstream session could not be opened; the client was told and closed.
    OpenFailed(ProviderError),
    /// The session was active and ended for the given reason.
    Finished(PumpExit),
}

/// What the outbound pump does with one upstream event.
#[derive(Debug, PartialEq, Eq)]
pub enum EventDisposition {
    Forward(Vec<ServerMessage>),
    Ignored,
}

/// Map an upstream event to client frames. Text goes before the
/// turn-complete marker when an event carries both.
pub fn dispatch(event: SessionEvent) -> EventDisposition {
    let mut messages = Vec::with_capacity(2);

    if let Some(text) = event.text {
        messages.push(ServerMessage::Text { text });
    }
    if event.turn_complete {
        messages.push(ServerMessage::TurnComplete);
    }

    if messages.is_empty() {
        EventDisposition::Ignored
    } else {
        EventDisposition::Forward(messages)
    }
}

/// Relay one client connection until either side terminates.
///
/// `client_tx` and `client_rx` are the two halves of the client socket.
pub async fn relay_connection<K, S, E>(
    provider: &dyn LiveProvider,
    mut client_tx: K,
    mut client_rx: S,
) -> RelayOutcome
where
    K: Sink<Message> + Unpin,
    K::Error: Display,
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let LiveSession {
        mut sender,
        mut events,
    } = match provider.open_session().await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "Failed to open upstream Live session");
            metrics::record_session("open_failed");
            send_error_and_close(&mut client_tx, &e.to_string()).await;
            return RelayOutcome::OpenFailed(e);
        }
    };

    metrics::session_opened();
    tracing::info!("Upstream Live session opened");

    let exit = tokio::select! {
        exit = inbound_pump(&mut client_rx, sender.as_mut()) => exit,
        exit = outbound_pump(&mut events, &mut client_tx) => exit,
    };

    drop(events);
    if let Err(e) = sender.close().await {
        tracing::warn!(error = %e, "Error closing upstream Live session");
    }
    metrics::session_closed();
    metrics::record_session(exit.outcome());

    match &exit {
        PumpExit::ClientDisconnected => tracing::info!("Client disconnected"),
        PumpExit::ClientFailed(e) => tracing::warn!(error = %e, "Client socket failed"),
        PumpExit::UpstreamClosed => {
            tracing::info!("Upstream Live session ended");
            close_client(&mut client_tx, close_code::NORMAL, "upstream session ended").await;
        }
        PumpExit::UpstreamFailed(e) => {
            tracing::error!(error = %e, "Upstream Live session failed");
            send_error_and_close(&mut client_tx, &e.to_string()).await;
        }
    }

    RelayOutcome::Finished(exit)
}

async fn inbound_pump<S, E>(client_rx: &mut S, upstream: &mut dyn SessionSender) -> PumpExit
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    while let Some(frame) = client_rx.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => return PumpExit::ClientFailed(e.to_string()),
        };

        match frame {
            Message::Text(text) => match ClientMessage::parse(&text) {
                Some(ClientMessage::Text { message }) => {
                    // Forwarded immediately, even while a previous turn is still streaming.
                    if let Err(e) = upstream.send_turn(&message).await {
                        return PumpExit::UpstreamFailed(e);
                    }
                    metrics::record_turn_forwarded();
                    tracing::debug!(len = message.len(), "Forwarded user turn upstream");
                }
                None => tracing::debug!("Ignoring unrecognised client frame"),
            },
            Message::Close(_) => return PumpExit::ClientDisconnected,
            _ => tracing::debug!("Ignoring non-text client frame"),
        }
    }

    PumpExit::ClientDisconnected
}

async fn outbound_pump<K>(events: &mut SessionEventStream, client_tx: &mut K) -> PumpExit
where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    while let Some(event) = events.next().await {
        let event = match event {
            Ok(event) => event,
            Err(e) => return PumpExit::UpstreamFailed(e),
        };

        match dispatch(event) {
            EventDisposition::Forward(messages) => {
                for message in messages {
                    if let Err(e) = client_tx.send(Message::Text(message.to_json())).await {
                        return PumpExit::ClientFailed(e.to_string());
                    }
                    metrics::record_event_forwarded(message.kind());
                }
            }
            EventDisposition::Ignored => {
                tracing::debug!("Ignoring upstream event without text or turn completion")
            }
        }
    }

    PumpExit::UpstreamClosed
}

async fn send_error_and_close<K>(client_tx: &mut K, error: &str)
where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    let frame = ServerMessage::Error {
        error: error.to_string(),
    };
    if let Err(e) = client_tx.send(Message::Text(frame.to_json())).await {
        tracing::debug!(error = %e, "Could not deliver error frame to client");
        return;
    }
    close_client(client_tx, close_code::ERROR, "upstream error").await;
}

async fn close_client<K>(client_tx: &mut K, code: u16, reason: &'static str)
where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    let close = Message::Close(Some(CloseFrame {
        code,
        reason: Cow::Borrowed(reason),
    }));
    if let Err(e) = client_tx.send(close).await {
        tracing::debug!(error = %e, "Could not send close frame to client");
    }
}
