//! API layer
//!
//! HTTP handlers for:
//! - Login status and logout
//! - Handle availability
//! - Portfolio documents and image uploads
//! - Metrics (Prometheus)

mod account;
mod images;
pub mod metrics;
mod portfolio;
mod reply;

use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

pub use metrics::metrics_router;
pub use reply::ApiReply;

/// Create the JSON API router, nested under `/api`
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/get_login", get(account::get_login))
        .route("/logout", get(account::logout))
        .route("/check_username", get(account::check_username))
        .route("/get_portfolio", get(portfolio::get_portfolio))
        .route("/put_portfolio", post(portfolio::put_portfolio))
        .route("/upload_image", post(images::upload_image))
}
