//! Foliopage - backend for a portfolio hosting site
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP Layer (Axum)                       │
//! │  - /auth/google/* OAuth entry points and callback           │
//! │  - /api/* JSON endpoints                                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Login/signup state machine                               │
//! │  - Username arbitration                                     │
//! │  - Image resizing                                           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx): identities, sessions, OAuth nonces        │
//! │  - S3 bucket: uploaded portfolio images                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: JSON handlers
//! - `auth`: Google OAuth, sessions, request extractors
//! - `service`: Business logic layer
//! - `data`: Database layer
//! - `storage`: Object storage for images
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod service;
pub mod storage;

use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all handlers
///
/// Cloned for each request; every field is shared.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Session store and cookie policy
    pub sessions: Arc<auth::SessionManager>,

    /// Login/signup orchestrator
    pub auth: Arc<service::AuthService>,

    /// Image resizing and storage
    pub images: Arc<service::ImageService>,
}

impl AppState {
    /// Initialize application state with the Google provider
    ///
    /// # Errors
    /// Returns error if the database or HTTP client cannot be set up
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        let provider = auth::GoogleProvider::new(
            &config.auth.google,
            config.server.callback_url(),
            Duration::from_secs(config.auth.provider_timeout_seconds),
        )?;

        Self::with_provider(config, Arc::new(provider)).await
    }

    /// Initialize application state around any identity provider
    pub async fn with_provider(
        config: config::AppConfig,
        provider: Arc<dyn auth::IdentityProvider>,
    ) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = Arc::new(data::Database::connect(&config.database.path).await?);
        tracing::info!(path = %config.database.path.display(), "Database connected");

        let sessions = Arc::new(auth::SessionManager::new(
            db.clone(),
            config.auth.session_max_age,
            config.should_use_secure_cookies(),
        ));
        let arbiter = Arc::new(service::UsernameArbiter::new(db.clone()));
        let auth = Arc::new(service::AuthService::new(
            db.clone(),
            arbiter,
            sessions.clone(),
            provider,
        ));
        let image_store = Arc::new(storage::S3ImageStore::new(&config.storage.images));
        let images = Arc::new(service::ImageService::new(image_store));
        tracing::info!(bucket = %config.storage.images.bucket, "Image storage configured");

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db,
            sessions,
            auth,
            images,
        })
    }

    /// Replace the image store, e.g. with a local double
    pub fn with_image_store(mut self, store: Arc<dyn storage::ImageStore>) -> Self {
        self.images = Arc::new(service::ImageService::new(store));
        self
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    let cors_layer = build_cors_layer(&state.config.frontend);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(auth::auth_router())
        .nest("/api", api::api_router())
        .merge(api::metrics_router())
        // Before the layers, so CORS still answers preflight requests.
        .method_not_allowed_fallback(method_not_allowed)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Wrong-method responses use the error envelope like every other failure.
async fn method_not_allowed() -> error::AppError {
    error::AppError::MethodNotAllowed
}

fn build_cors_layer(frontend: &config::FrontendConfig) -> tower_http::cors::CorsLayer {
    use axum::http::{HeaderValue, Method, header::CONTENT_TYPE};
    use tower_http::cors::CorsLayer;

    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true);

    let origin = frontend.url.trim_end_matches('/');
    match HeaderValue::from_str(origin) {
        Ok(origin) => base.allow_origin(origin),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %origin,
                "Failed to parse CORS origin from frontend URL; denying cross-origin requests"
            );
            base
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
