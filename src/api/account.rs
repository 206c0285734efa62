//! Login status, logout, and handle availability

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect},
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use super::reply::ApiReply;
use crate::AppState;
use crate::auth::RequestSession;
use crate::error::AppError;

/// GET /api/get_login
///
/// 200 when the session is bound to an existing identity, 401 otherwise.
pub async fn get_login(
    State(state): State<AppState>,
    RequestSession(mut session): RequestSession,
) -> Result<ApiReply, AppError> {
    state.auth.current_login(&mut session).await?;
    Ok(ApiReply::NoBody)
}

/// GET /api/logout
pub async fn logout(
    State(state): State<AppState>,
    RequestSession(mut session): RequestSession,
    jar: CookieJar,
) -> Result<ApiReply, AppError> {
    state.auth.logout(&mut session).await?;

    let jar = state.sessions.apply(jar, &session);
    let home = state.config.frontend.link("/");
    Ok(ApiReply::PreHandled(
        (jar, Redirect::temporary(&home)).into_response(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct UsernameQuery {
    #[serde(default)]
    username: String,
}

/// GET /api/check_username?username=
pub async fn check_username(
    State(state): State<AppState>,
    Query(query): Query<UsernameQuery>,
) -> Result<ApiReply, AppError> {
    let available = state.auth.check_username(&query.username).await?;
    Ok(ApiReply::Json(serde_json::Value::Bool(available)))
}
