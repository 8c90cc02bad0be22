//! Domain models for the live relay service.

pub mod message;
pub mod token;

pub use message::{ClientMessage, ServerMessage};
pub use token::{EphemeralToken, Modality, TokenGrant, TokenMode, TokenRequest, TokenResponse};
