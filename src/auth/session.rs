//! Session management
//!
//! Sessions live server-side in the `sessions` table, keyed by the digest of
//! an opaque random token. The raw token is the only thing the browser holds,
//! delivered in the `session` cookie.
//!
//! The token is replaced whenever the identity binding changes. The old row
//! is deleted in the same transaction that inserts the new one.

use std::sync::Arc;

use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Duration, Utc};

use crate::data::{Database, EntityId, SessionRecord, hash_token};
use crate::error::AppError;

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "session";

/// One browser's session as seen by a single request
#[derive(Debug, Clone)]
pub struct Session {
    token: String,
    identity_id: Option<String>,
    expires_at: DateTime<Utc>,
    /// A row exists for `token`
    persisted: bool,
    /// The token changed during this request and must be sent back
    rotated: bool,
}

impl Session {
    fn anonymous(expires_at: DateTime<Utc>) -> Self {
        Self {
            token: super::generate_token(),
            identity_id: None,
            expires_at,
            persisted: false,
            rotated: false,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Raw stored binding, which may be malformed
    pub fn identity_id(&self) -> Option<&str> {
        self.identity_id.as_deref()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn was_rotated(&self) -> bool {
        self.rotated
    }
}

/// Issues, renews, and invalidates sessions
pub struct SessionManager {
    db: Arc<Database>,
    lifetime: Duration,
    secure_cookies: bool,
}

impl SessionManager {
    /// # Arguments
    /// * `lifetime_seconds` - Validity measured from the last token renewal
    /// * `secure_cookies` - Mark the cookie `Secure`
    pub fn new(db: Arc<Database>, lifetime_seconds: i64, secure_cookies: bool) -> Self {
        Self {
            db,
            lifetime: Duration::seconds(lifetime_seconds),
            secure_cookies,
        }
    }

    /// Resolve the session for a presented token.
    ///
    /// Unknown or expired tokens yield a fresh anonymous session that is not
    /// stored until it gains a binding.
    pub async fn load(&self, token: Option<&str>) -> Result<Session, AppError> {
        let now = Utc::now();

        if let Some(token) = token.filter(|t| !t.is_empty()) {
            if let Some(record) = self
                .db
                .get_session(&hash_token(token), now.timestamp())
                .await?
            {
                return Ok(Session {
                    token: token.to_string(),
                    identity_id: record.identity_id.clone(),
                    expires_at: record.expires_at_utc(),
                    persisted: true,
                    rotated: false,
                });
            }
        }

        Ok(Session::anonymous(now + self.lifetime))
    }

    /// Identity bound to this session.
    ///
    /// A binding that is not a valid identifier is cleared before the
    /// error is returned.
    pub async fn current_identity(&self, session: &mut Session) -> Result<EntityId, AppError> {
        let Some(raw) = session.identity_id.as_deref() else {
            return Err(AppError::Unauthorized);
        };

        match EntityId::parse(raw) {
            Some(id) => Ok(id),
            None => {
                tracing::warn!("Clearing malformed session identity binding");
                self.clear_binding(session).await?;
                Err(AppError::Unauthorized)
            }
        }
    }

    /// Rotate the token, then bind `identity_id`.
    pub async fn bind(&self, session: &mut Session, identity_id: &EntityId) -> Result<(), AppError> {
        self.rotate(session, Some(identity_id.0.clone())).await
    }

    /// Rotate the token and drop the binding.
    pub async fn unbind(&self, session: &mut Session) -> Result<(), AppError> {
        self.rotate(session, None).await
    }

    /// Drop the binding but keep the token.
    pub async fn clear_binding(&self, session: &mut Session) -> Result<(), AppError> {
        if session.persisted {
            self.db
                .update_session_identity(&hash_token(&session.token), None)
                .await?;
        }
        session.identity_id = None;
        Ok(())
    }

    async fn rotate(&self, session: &mut Session, identity_id: Option<String>) -> Result<(), AppError> {
        let old_hash = session.persisted.then(|| hash_token(&session.token));
        let token = super::generate_token();
        let expires_at = Utc::now() + self.lifetime;

        let record = SessionRecord {
            token_hash: hash_token(&token),
            identity_id,
            expires_at: expires_at.timestamp(),
        };
        self.db.replace_session(old_hash.as_deref(), &record).await?;

        session.token = token;
        session.identity_id = record.identity_id;
        session.expires_at = expires_at;
        session.persisted = true;
        session.rotated = true;
        Ok(())
    }

    /// Delete every expired session.
    pub async fn purge_expired(&self) -> Result<u64, AppError> {
        let now = Utc::now().timestamp();
        let sessions = self.db.delete_expired_sessions(now).await?;
        let states = self.db.delete_expired_oauth_states(now).await?;
        crate::metrics::SESSIONS_PURGED_TOTAL.inc_by(sessions);

        tracing::debug!(sessions, oauth_states = states, "Purged expired records");
        Ok(sessions)
    }

    /// Browser-session cookie; expiry is enforced server-side.
    pub fn cookie(&self, session: &Session) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, session.token.clone()))
            .path("/")
            .http_only(true)
            .secure(self.secure_cookies)
            .same_site(SameSite::Lax)
            .build()
    }

    /// Attach the session cookie when the token changed.
    pub fn apply(&self, jar: CookieJar, session: &Session) -> CookieJar {
        if session.rotated {
            jar.add(self.cookie(session))
        } else {
            jar
        }
    }
}
