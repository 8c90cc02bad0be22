//! Gemini Live relay: ephemeral token issuer and chat WebSocket relay.

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
