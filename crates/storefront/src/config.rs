//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `PALENGKE_API_BASE_URL` - Backend REST base URL (default: `http://127.0.0.1:8000/api`)
//! - `PALENGKE_API_TOKEN` - Bearer token for the signed-in customer
//! - `PALENGKE_LOCATION_CACHE_TTL_SECS` - Location list cache TTL (default: 3600)
//! - `PALENGKE_HTTP_USER_AGENT` - User-Agent sent to the backend
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api";
const DEFAULT_LOCATION_CACHE_TTL_SECS: u64 = 3600;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront core configuration.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub struct StorefrontConfig {
    /// Base URL of the REST backend; resource paths are appended to it
    pub api_base_url: Url,
    /// Bearer token attached to every request, if signed in
    pub api_token: Option<SecretString>,
    /// How long province/city/barangay lists stay cached
    pub location_cache_ttl: Duration,
    /// User-Agent header override
    pub user_agent: Option<String>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl std::fmt::Debug for StorefrontConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontConfig")
            .field("api_base_url", &self.api_base_url.as_str())
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("location_cache_ttl", &self.location_cache_ttl)
            .field("user_agent", &self.user_agent)
            .field("sentry_dsn", &self.sentry_dsn)
            .field("sentry_environment", &self.sentry_environment)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_base_url = parse_base_url(
            "PALENGKE_API_BASE_URL",
            &get("PALENGKE_API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
        )?;

        let api_token = get("PALENGKE_API_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .map(SecretString::from);

        let location_cache_ttl = get("PALENGKE_LOCATION_CACHE_TTL_SECS")
            .map_or(Ok(DEFAULT_LOCATION_CACHE_TTL_SECS), |value| {
                value.trim().parse::<u64>().map_err(|e| {
                    ConfigError::InvalidEnvVar(
                        "PALENGKE_LOCATION_CACHE_TTL_SECS".to_string(),
                        e.to_string(),
                    )
                })
            })
            .map(Duration::from_secs)?;

        Ok(Self {
            api_base_url,
            api_token,
            location_cache_ttl,
            user_agent: get("PALENGKE_HTTP_USER_AGENT"),
            sentry_dsn: get("SENTRY_DSN"),
            sentry_environment: get("SENTRY_ENVIRONMENT"),
        })
    }

    /// Configuration pointing at `base_url` with defaults for everything else.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL is not a usable HTTP base.
    pub fn for_base_url(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base_url: parse_base_url("PALENGKE_API_BASE_URL", base_url)?,
            api_token: None,
            location_cache_ttl: Duration::from_secs(DEFAULT_LOCATION_CACHE_TTL_SECS),
            user_agent: None,
            sentry_dsn: None,
            sentry_environment: None,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse and validate the backend base URL.
fn parse_base_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be a base URL".to_string(),
        ));
    }

    Ok(url)
}
