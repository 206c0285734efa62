//! Request extractors
//!
//! Resolve the caller's session from the `session` cookie and capture
//! signup provenance from the connection.

use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{header::USER_AGENT, request::Parts},
};
use axum_extra::extract::CookieJar;
use chrono::Utc;

use super::session::{SESSION_COOKIE, Session};
use crate::AppState;
use crate::data::Provenance;
use crate::error::AppError;

/// Session for the current request
///
/// Never rejects for a missing or stale cookie; those resolve to a fresh
/// anonymous session. Handlers that change the binding must send the cookie
/// back with [`SessionManager::apply`](super::SessionManager::apply).
///
/// # Usage
/// ```ignore
/// async fn handler(
///     State(state): State<AppState>,
///     RequestSession(mut session): RequestSession,
/// ) -> Result<ApiReply, AppError> {
///     state.auth.current_login(&mut session).await?;
///     Ok(ApiReply::NoBody)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequestSession(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for RequestSession
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(SESSION_COOKIE).map(|cookie| cookie.value().to_owned());

        let session = state.sessions.load(token.as_deref()).await?;
        Ok(RequestSession(session))
    }
}

/// Remote address and user agent of the request
#[derive(Debug, Clone)]
pub struct RequestProvenance(pub Provenance);

#[async_trait]
impl<S> FromRequestParts<S> for RequestProvenance
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let remote_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string());
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned);

        Ok(RequestProvenance(Provenance {
            remote_addr,
            user_agent,
            at: Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn provenance_reads_connect_info_and_user_agent() {
        let request = Request::builder()
            .uri("/auth/google/callback")
            .header(USER_AGENT, "Mozilla/5.0")
            .extension(ConnectInfo(SocketAddr::from(([198, 51, 100, 7], 4242))))
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let RequestProvenance(provenance) =
            RequestProvenance::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(provenance.remote_addr.as_deref(), Some("198.51.100.7:4242"));
        assert_eq!(provenance.user_agent.as_deref(), Some("Mozilla/5.0"));
    }

    #[tokio::test]
    async fn provenance_tolerates_missing_fields() {
        let (mut parts, _) = Request::builder().uri("/").body(()).unwrap().into_parts();

        let RequestProvenance(provenance) =
            RequestProvenance::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(provenance.remote_addr.is_none());
        assert!(provenance.user_agent.is_none());
    }
}
