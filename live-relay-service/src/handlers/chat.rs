use crate::services::relay::relay_connection;
use crate::startup::AppState;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::StreamExt;
use tracing::Instrument;
use uuid::Uuid;

/// `WS /ws/chat`: relay a browser chat socket to a Gemini Live session.
pub async fn chat_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_failed_upgrade(|e| tracing::error!(error = %e, "WebSocket upgrade failed"))
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();
    let span = tracing::info_span!("chat_relay", connection_id = %connection_id);

    async move {
        tracing::info!("Client connected");

        let (client_tx, client_rx) = socket.split();
        let outcome = relay_connection(state.provider.as_ref(), client_tx, client_rx).await;

        tracing::debug!(?outcome, "Relay finished");
    }
    .instrument(span)
    .await
}
