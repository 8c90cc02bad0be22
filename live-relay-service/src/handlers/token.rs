use crate::models::{TokenMode, TokenRequest, TokenResponse};
use crate::services::metrics;
use crate::startup::AppState;
use axum::extract::rejection::JsonRejection;
use axum::{extract::State, Json};
use service_core::error::AppError;

/// `POST /api/token`: mint a single-use ephemeral token for a direct
/// browser-to-Gemini Live connection.
///
/// Not idempotent: every call mints a new token.
pub async fn create_token(
    State(state): State<AppState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(anyhow::anyhow!(e.body_text())))?;
    let mode = TokenMode::from_request(&request.mode);

    match state.provider.mint_token(mode).await {
        Ok(token) => {
            metrics::record_token(mode.as_str(), "ok");
            tracing::info!(
                mode = %request.mode,
                model = %token.model,
                expires_at = %token.expire_time,
                new_session_until = %token.new_session_expire_time,
                "Minted ephemeral token"
            );

            Ok(Json(TokenResponse {
                token: token.name,
                model: token.model,
                mode: request.mode,
            }))
        }
        Err(e) => {
            metrics::record_token(mode.as_str(), "error");
            tracing::error!(error = %e, mode = %request.mode, "Failed to mint ephemeral token");
            Err(AppError::UpstreamError(e.to_string()))
        }
    }
}
