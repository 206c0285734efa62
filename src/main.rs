//! Foliopage binary entry point

use std::net::SocketAddr;

use foliopage::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Initialize tracing/logging
/// 2. Load configuration from file and environment
/// 3. Initialize AppState
/// 4. Build Axum router
/// 5. Start background tasks (session cleanup)
/// 6. Start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize tracing/logging
    let log_format =
        std::env::var("FOLIOPAGE__LOGGING__FORMAT").unwrap_or_else(|_| "pretty".to_string());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "foliopage=info,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "foliopage=info,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting Foliopage...");

    // 2. Initialize metrics
    foliopage::metrics::init_metrics();

    // 3. Load configuration
    let config = config::AppConfig::load()?;
    tracing::info!(
        public_url = %config.server.public_url,
        frontend = %config.frontend.url,
        "Configuration loaded"
    );

    // 4. Initialize application state
    let state = AppState::new(config.clone()).await?;

    // 5. Build Axum router
    let app = foliopage::build_router(state.clone());

    // 6. Start background tasks
    spawn_session_cleanup_task(state.clone());

    // 7. Start HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("OAuth callback: {}", config.server.callback_url());

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Spawn background task purging expired sessions and OAuth nonces
fn spawn_session_cleanup_task(state: AppState) {
    tokio::spawn(async move {
        let configured_interval_secs = state.config.session.cleanup_interval_seconds;
        let period = state.config.session.effective_cleanup_interval();
        let mut interval = tokio::time::interval(period);

        if period.as_secs() != configured_interval_secs {
            tracing::warn!(
                configured = configured_interval_secs,
                effective = period.as_secs(),
                "session.cleanup_interval_seconds clamped to the OAuth nonce lifetime"
            );
        }

        loop {
            interval.tick().await;

            match state.sessions.purge_expired().await {
                Ok(purged) => tracing::info!(purged, "Session cleanup completed"),
                Err(error) => tracing::error!(%error, "Session cleanup failed"),
            }
        }
    });

    tracing::info!("Session cleanup task spawned");
}
