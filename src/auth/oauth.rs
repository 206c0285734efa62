//! Google OAuth flow
//!
//! Entry points send the browser to Google; the callback settles the
//! outcome and redirects back to the frontend.

use axum::{
    Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
    routing::get,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use super::middleware::{RequestProvenance, RequestSession};
use crate::AppState;
use crate::error::AppError;

/// Create authentication router
///
/// Routes:
/// - GET /auth/google/signup?username= - Start signup for a handle
/// - GET /auth/google/login - Start login
/// - GET /auth/google/callback - OAuth callback
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/auth/google/signup", get(google_signup))
        .route("/auth/google/login", get(google_login))
        .route("/auth/google/callback", get(google_callback))
}

#[derive(Debug, Deserialize)]
struct SignupQuery {
    #[serde(default)]
    username: String,
}

/// GET /auth/google/signup
///
/// 400 with `{"username": ...}` as error data when the handle is unavailable.
async fn google_signup(
    State(state): State<AppState>,
    Query(query): Query<SignupQuery>,
) -> Result<Redirect, AppError> {
    let url = state.auth.begin_signup(&query.username).await?;
    Ok(Redirect::temporary(&url))
}

/// GET /auth/google/login
async fn google_login(State(state): State<AppState>) -> Result<Redirect, AppError> {
    let url = state.auth.begin_login().await?;
    Ok(Redirect::temporary(&url))
}

/// Query parameters from the Google callback
#[derive(Debug, Deserialize)]
struct GoogleCallbackQuery {
    #[serde(default)]
    state: String,
    /// Absent when the user denied consent
    code: Option<String>,
}

/// GET /auth/google/callback
///
/// # Steps
/// 1. Consume the correlation nonce (401 if unknown)
/// 2. Exchange the code and read the verified email
/// 3. Resolve login or signup, rotating the session on any binding change
/// 4. Redirect to the frontend
async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<GoogleCallbackQuery>,
    RequestSession(mut session): RequestSession,
    RequestProvenance(provenance): RequestProvenance,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .auth
        .complete_callback(&mut session, &query.state, query.code.as_deref(), provenance)
        .await?;

    let jar = state.sessions.apply(jar, &session);
    let target = state.config.frontend.link(&outcome.redirect_path());
    Ok((jar, Redirect::temporary(&target)))
}
