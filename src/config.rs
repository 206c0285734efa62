//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::{net::IpAddr, path::PathBuf, time::Duration};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub frontend: FrontendConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub session: SessionConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8000)
    pub port: u16,
    /// Public URL of this backend, used to build the OAuth redirect URI
    /// (e.g., "https://api.foliopage.com")
    pub public_url: String,
}

impl ServerConfig {
    /// OAuth callback registered with the provider
    pub fn callback_url(&self) -> String {
        format!(
            "{}/auth/google/callback",
            self.public_url.trim_end_matches('/')
        )
    }
}

/// Frontend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FrontendConfig {
    /// Origin of the single-page frontend; redirects and CORS target it
    pub url: String,
}

impl FrontendConfig {
    /// Absolute frontend URL for a path such as "/editor"
    pub fn link(&self, path: &str) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), path)
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Authentication configuration (Google OAuth)
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session lifetime in seconds (default: 86400 = 24h)
    pub session_max_age: i64,
    /// Timeout for each identity provider request (default: 10)
    pub provider_timeout_seconds: u64,
    pub google: GoogleOAuthConfig,
}

/// Google OAuth configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
}

/// Session housekeeping
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Interval between expired-session sweeps (default: 600)
    pub cleanup_interval_seconds: u64,
}

impl SessionConfig {
    /// Sweep interval, clamped to `1..=STATE_TTL_SECONDS`.
    ///
    /// Every unauthenticated login attempt stores a nonce, so sweeps must
    /// keep up with the nonce lifetime.
    pub fn effective_cleanup_interval(&self) -> Duration {
        let ttl = crate::auth::STATE_TTL_SECONDS.unsigned_abs();
        Duration::from_secs(self.cleanup_interval_seconds.clamp(1, ttl))
    }
}

/// Object storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub images: ImageStorageConfig,
}

/// Bucket for uploaded portfolio images
#[derive(Debug, Clone, Deserialize)]
pub struct ImageStorageConfig {
    /// Bucket name (default: "foliopage-images")
    pub bucket: String,
    pub region: String,
    /// Custom S3-compatible endpoint; AWS is used when unset
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Public URL base that uploaded keys are appended to
    /// (e.g., "https://foliopage-images.s3.amazonaws.com")
    pub public_url: String,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
}

impl ImageStorageConfig {
    /// Public URL of an uploaded object
    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_url.trim_end_matches('/'), key)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (FOLIOPAGE__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8000)?
            .set_default("server.public_url", "http://localhost:8000")?
            .set_default("frontend.url", "http://localhost:3000")?
            .set_default("database.path", "data/foliopage.db")?
            .set_default("auth.session_max_age", 86400)?
            .set_default("auth.provider_timeout_seconds", 10)?
            .set_default("session.cleanup_interval_seconds", 600)?
            .set_default("storage.images.bucket", "foliopage-images")?
            .set_default("storage.images.region", "us-east-1")?
            .set_default(
                "storage.images.public_url",
                "https://foliopage-images.s3.amazonaws.com",
            )?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (FOLIOPAGE__*)
            .add_source(
                Environment::with_prefix("FOLIOPAGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        url::Url::parse(&self.server.public_url)
            .map(|url| url.scheme() == "https" || !is_local_host(url.host_str().unwrap_or("")))
            .unwrap_or(true)
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        if self.auth.session_max_age <= 0 {
            return Err(AppError::Config(
                "auth.session_max_age must be greater than 0".to_string(),
            ));
        }

        if self.auth.provider_timeout_seconds == 0 {
            return Err(AppError::Config(
                "auth.provider_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.auth.google.client_id.trim().is_empty() {
            return Err(AppError::Config(
                "auth.google.client_id must not be empty".to_string(),
            ));
        }

        if self.storage.images.bucket.trim().is_empty() {
            return Err(AppError::Config(
                "storage.images.bucket must not be empty".to_string(),
            ));
        }

        for (key, value) in [
            ("server.public_url", &self.server.public_url),
            ("frontend.url", &self.frontend.url),
            ("storage.images.public_url", &self.storage.images.public_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| AppError::Config(format!("{key} is not a valid URL: {e}")))?;
        }

        let public = url::Url::parse(&self.server.public_url)
            .map_err(|e| AppError::Config(e.to_string()))?;
        let host = public.host_str().unwrap_or("");
        if is_local_host(host) {
            if public.scheme() != "https" {
                tracing::warn!(
                    host = %host,
                    "Using insecure session cookies for local development"
                );
            }
        } else if public.scheme() != "https" {
            return Err(AppError::Config(
                "server.public_url must be https for non-local hosts".to_string(),
            ));
        }

        Ok(())
    }
}

fn is_local_host(host: &str) -> bool {
    let host = host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim_end_matches('.')
        .to_ascii_lowercase();
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}
