//! Application configuration loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Where credentials and activities are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(Self::Firestore),
            "memory" => Ok(Self::Memory),
            _ => Err(ConfigError::Invalid("STORE_BACKEND")),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Strava REST API base URL
    pub strava_api_url: String,
    /// Strava OAuth token endpoint
    pub strava_token_url: String,
    /// Webhook verification token
    pub webhook_verify_token: String,
    /// Shared secret required to trigger a full sync over HTTP
    pub sync_trigger_token: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    pub store_backend: StoreBackend,
    /// Server port
    pub port: u16,
    /// Attempts per Strava request before a 429 becomes an error
    pub rate_limit_max_attempts: u32,
    /// Pause before retrying a 429 when the quota looks available
    pub rate_limit_retry_backoff: Duration,
    /// Start a full sync for every known athlete at startup
    pub sync_on_startup: bool,
}

impl Config {
    /// Config for tests: in-memory store, no retry back-off.
    pub fn test_default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            strava_client_secret: "test_secret".to_string(),
            strava_api_url: "http://127.0.0.1:9/api/v3".to_string(),
            strava_token_url: "http://127.0.0.1:9/oauth/token".to_string(),
            webhook_verify_token: "test_verify_token".to_string(),
            sync_trigger_token: "test_sync_token".to_string(),
            gcp_project_id: "test-project".to_string(),
            store_backend: StoreBackend::Memory,
            port: 8080,
            rate_limit_max_attempts: 5,
            rate_limit_retry_backoff: Duration::ZERO,
            sync_on_startup: false,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file is loaded first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            strava_client_id: required("STRAVA_CLIENT_ID")?,
            strava_client_secret: required("STRAVA_CLIENT_SECRET")?,
            strava_api_url: env::var("STRAVA_API_URL")
                .unwrap_or_else(|_| "https://www.strava.com/api/v3".to_string()),
            strava_token_url: env::var("STRAVA_TOKEN_URL")
                .unwrap_or_else(|_| "https://www.strava.com/oauth/token".to_string()),
            webhook_verify_token: required("WEBHOOK_VERIFY_TOKEN")?,
            sync_trigger_token: required("SYNC_TRIGGER_TOKEN")?,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            store_backend: parsed("STORE_BACKEND", StoreBackend::Firestore)?,
            port: parsed("PORT", 8080)?,
            rate_limit_max_attempts: at_least_one(
                "RATE_LIMIT_MAX_ATTEMPTS",
                parsed("RATE_LIMIT_MAX_ATTEMPTS", 5)?,
            )?,
            rate_limit_retry_backoff: Duration::from_millis(parsed(
                "RATE_LIMIT_RETRY_BACKOFF_MS",
                1000,
            )?),
            sync_on_startup: parsed("SYNC_ON_STARTUP", false)?,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// A count where zero would mean the work is never attempted.
fn at_least_one(name: &'static str, value: u32) -> Result<u32, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid(name));
    }
    Ok(value)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
