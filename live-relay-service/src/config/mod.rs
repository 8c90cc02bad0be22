use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Model baked into minted ephemeral tokens.
pub const DEFAULT_TOKEN_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";

/// Model used for relayed text chat sessions.
pub const DEFAULT_LIVE_MODEL: &str = "gemini-live-2.5-flash-preview";

/// The single browser origin allowed to call this service.
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub gemini: GeminiSettings,
    pub cors: CorsConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiSettings {
    pub api_key: String,
    /// Model constrained into ephemeral tokens (native audio capable).
    pub token_model: String,
    /// Model for server-side relayed sessions.
    pub live_model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origin: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

impl RelayConfig {
    /// Load configuration from the environment.
    ///
    /// Fails with [`AppError::ConfigError`] when `GEMINI_API_KEY` is absent,
    /// which the binary treats as fatal.
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        Self::from_lookup(common_config, |key| env::var(key).ok())
    }

    /// Build the relay settings from `lookup`; empty values count as unset.
    fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let is_prod = lookup("ENVIRONMENT").as_deref() == Some("prod");

        Ok(RelayConfig {
            common,
            gemini: GeminiSettings {
                api_key: get_env(&lookup, "GEMINI_API_KEY", None, is_prod)?,
                token_model: get_env(&lookup, "GEMINI_TOKEN_MODEL", Some(DEFAULT_TOKEN_MODEL), is_prod)?,
                live_model: get_env(&lookup, "GEMINI_LIVE_MODEL", Some(DEFAULT_LIVE_MODEL), is_prod)?,
            },
            cors: CorsConfig {
                allowed_origin: get_env(
                    &lookup,
                    "ALLOWED_ORIGIN",
                    Some(DEFAULT_ALLOWED_ORIGIN),
                    is_prod,
                )?,
            },
            observability: ObservabilityConfig {
                log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
                otlp_endpoint: lookup("OTLP_ENDPOINT"),
            },
        })
    }

    /// Configuration with defaults for everything but the API key.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        RelayConfig {
            common: core_config::Config::default(),
            gemini: GeminiSettings {
                api_key: api_key.into(),
                token_model: DEFAULT_TOKEN_MODEL.to_string(),
                live_model: DEFAULT_LIVE_MODEL.to_string(),
            },
            cors: CorsConfig {
                allowed_origin: DEFAULT_ALLOWED_ORIGIN.to_string(),
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                otlp_endpoint: None,
            },
        }
    }
}

/// Keys with a default never fail; keys without one are always required.
fn get_env<F>(lookup: &F, key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match (lookup(key), default) {
        (Some(val), _) => Ok(val),
        (None, Some(def)) => Ok(def.to_string()),
        (None, None) if is_prod => Err(AppError::ConfigError(anyhow::anyhow!(
            "{} is required in production but not set",
            key
        ))),
        (None, None) => Err(AppError::ConfigError(anyhow::anyhow!(
            "{} is required but not set",
            key
        ))),
    }
}
