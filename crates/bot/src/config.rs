//! Bot configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `TELEGRAM_TOKEN` - Telegram Bot API token
//! - `PAYMENT_PROVIDER_TOKEN` - Telegram payments provider token
//! - `ELASTIC_CLIENT_ID` - Commerce backend OAuth client ID
//! - `ELASTIC_CLIENT_SECRET` - Commerce backend OAuth client secret
//! - `YANDEX_GEOCODER_KEY` - Yandex geocoder API key
//!
//! ## Optional
//! - `ELASTIC_BASE_URL` - Commerce backend base URL (default: <https://api.moltin.com>)
//! - `MENU_PAGE_SIZE` - Products per menu page (default: 8)
//! - `SESSION_CAPACITY` - Max cached sessions (default: 10000)
//! - `SESSION_TTL_SECS` - Session idle eviction, seconds (default: 86400)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Bot application configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram Bot API token.
    pub telegram_token: SecretString,
    /// Telegram payments provider token.
    pub payment_provider_token: SecretString,
    /// Commerce backend configuration.
    pub commerce: CommerceConfig,
    /// Geocoder configuration.
    pub geocoder: GeocoderConfig,
    /// Products per menu page.
    pub menu_page_size: usize,
    /// Max number of cached sessions.
    pub session_capacity: u64,
    /// Session idle eviction time.
    pub session_ttl: Duration,
    /// Sentry DSN for error tracking.
    pub sentry_dsn: Option<String>,
    /// Sentry environment name.
    pub sentry_environment: Option<String>,
}

/// Commerce backend API configuration.
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct CommerceConfig {
    /// Base URL of the commerce REST API.
    pub base_url: String,
    /// OAuth client ID (client_credentials grant).
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: SecretString,
}

impl std::fmt::Debug for CommerceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommerceConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Yandex geocoder configuration.
#[derive(Clone)]
pub struct GeocoderConfig {
    /// Geocoder API key.
    pub api_key: SecretString,
}

impl std::fmt::Debug for GeocoderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeocoderConfig")
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl BotConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let menu_page_size = parse_env_or("MENU_PAGE_SIZE", 8)?;
        let session_capacity = parse_env_or("SESSION_CAPACITY", 10_000)?;
        let session_ttl_secs: u64 = parse_env_or("SESSION_TTL_SECS", 86_400)?;

        Ok(Self {
            telegram_token: get_required_secret("TELEGRAM_TOKEN")?,
            payment_provider_token: get_required_secret("PAYMENT_PROVIDER_TOKEN")?,
            commerce: CommerceConfig::from_env()?,
            geocoder: GeocoderConfig {
                api_key: get_required_secret("YANDEX_GEOCODER_KEY")?,
            },
            menu_page_size,
            session_capacity,
            session_ttl: Duration::from_secs(session_ttl_secs),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

impl CommerceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: get_env_or_default("ELASTIC_BASE_URL", "https://api.moltin.com"),
            client_id: get_required_env("ELASTIC_CLIENT_ID")?,
            client_secret: get_required_secret("ELASTIC_CLIENT_SECRET")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to a default when unset.
fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn commerce_config_debug_redacts_secret() {
        let config = CommerceConfig {
            base_url: "https://api.moltin.com".to_string(),
            client_id: "client_id_value".to_string(),
            client_secret: SecretString::from("super_secret_value"),
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("client_id_value"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_value"));
    }

    #[test]
    fn geocoder_config_debug_redacts_key() {
        let config = GeocoderConfig {
            api_key: SecretString::from("geo_secret_key"),
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("geo_secret_key"));
    }
}
