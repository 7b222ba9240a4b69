//! services/api/src/config.rs
//!
//! Defines the service's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development. The delivery endpoint and its token are
//! NOT part of this: they are user settings owned by the composer and persisted
//! through the settings store.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// Gemini's OpenAI-compatible endpoint.
pub const DEFAULT_GENERATION_API_BASE: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-2.5-flash";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub gemini_api_key: Option<String>,
    pub generation_model: String,
    pub generation_api_base: String,
    pub settings_path: PathBuf,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:5173".to_string());

        // --- Generative-text Backend ---
        // The key is optional here; the binary decides whether it can run without one.
        let gemini_api_key = lookup("GEMINI_API_KEY")
            .or_else(|| lookup("API_KEY"))
            .filter(|key| !key.is_empty());
        let generation_model =
            lookup("GENERATION_MODEL").unwrap_or_else(|| DEFAULT_GENERATION_MODEL.to_string());
        let generation_api_base = lookup("GENERATION_API_BASE")
            .unwrap_or_else(|| DEFAULT_GENERATION_API_BASE.to_string());

        // --- Settings Storage ---
        let settings_path = match lookup("SETTINGS_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_settings_path()?,
        };

        Ok(Self {
            bind_address,
            log_level,
            gemini_api_key,
            generation_model,
            generation_api_base,
            settings_path,
            cors_origin,
        })
    }
}

fn default_settings_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("cf-mailer").join("settings.json"))
        .ok_or_else(|| ConfigError::MissingVar("SETTINGS_PATH".to_string()))
}
