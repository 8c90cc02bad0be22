//! HTTP and WebSocket handlers for the live relay service.

pub mod app;
pub mod chat;
pub mod token;
