#![allow(dead_code)]

use live_relay_service::config::RelayConfig;
use live_relay_service::services::{LiveProvider, MockLiveProvider};
use live_relay_service::startup::{build_router, AppState, Application};
use std::sync::Arc;
use std::time::Duration;

pub const TEST_ORIGIN: &str = "http://localhost:3000";

pub fn test_config() -> RelayConfig {
    let mut config = RelayConfig::with_api_key("test-api-key");
    config.common.port = 0; // Random port
    config
}

/// Router backed by `provider`, for `oneshot` tests.
pub fn router_with(provider: MockLiveProvider) -> axum::Router {
    let state = AppState {
        config: Arc::new(test_config()),
        provider: Arc::new(provider),
    };
    build_router(state).expect("Failed to build router")
}

/// Spawn the application on a random port and return the port number.
pub async fn spawn_app(provider: Arc<dyn LiveProvider>) -> u16 {
    let app = Application::build_with_provider(test_config(), provider)
        .await
        .expect("Failed to build application");

    let port = app.port();

    // Spawn the server in the background
    tokio::spawn(async move {
        let _ = app.run_until_stopped().await;
    });

    // Wait for server to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    port
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Failed to parse JSON")
}
