//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

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
    pub database_url: String,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub jwt_secret: String,
    pub access_token_expire_minutes: i64,
    pub hsk_vocabulary_path: PathBuf,
    pub frontend_url: String,
    pub password_reset_ttl_minutes: i64,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Critique Oracle ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let openai_model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        // --- Auth ---
        let jwt_secret = std::env::var("JWT_SECRET")
            .map_err(|_| ConfigError::MissingVar("JWT_SECRET".to_string()))?;
        let access_token_expire_minutes = minutes_var("ACCESS_TOKEN_EXPIRE_MINUTES", 1440)?;
        let password_reset_ttl_minutes = minutes_var("PASSWORD_RESET_TTL_MINUTES", 60)?;

        // --- Vocabulary and Frontend ---
        let hsk_vocabulary_path = std::env::var("HSK_VOCABULARY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/hsk_vocabulary.json"));
        let frontend_url = std::env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:5173".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            openai_model,
            jwt_secret,
            access_token_expire_minutes,
            hsk_vocabulary_path,
            frontend_url,
            password_reset_ttl_minutes,
        })
    }
}

fn minutes_var(name: &str, default: i64) -> Result<i64, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<i64>() {
            Ok(minutes) if minutes > 0 => Ok(minutes),
            _ => Err(ConfigError::InvalidValue(
                name.to_string(),
                format!("'{}' is not a positive number of minutes", raw),
            )),
        },
        Err(_) => Ok(default),
    }
}
