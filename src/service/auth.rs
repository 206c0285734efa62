//! Login and signup orchestration
//!
//! A provider callback resolves two facts: whether the verified email
//! already belongs to an identity, and whether the flow started at the
//! signup entry point (the correlation state carries a handle).
//!
//! | email known | signup | result |
//! |---|---|---|
//! | yes | no  | bind existing identity, `/editor` |
//! | no  | yes | insert identity then bind, `/editor` (or `/signup?error=true` if the handle was lost) |
//! | yes | yes | bind existing identity, `/editor?existing_login=<handle>` |
//! | no  | no  | `/signup?finish=true`, session untouched |

use std::sync::Arc;

use crate::auth::{CorrelationIssuer, CorrelationState, IdentityProvider, Session, SessionManager};
use crate::data::{
    Database, EntityId, Identity, InsertOutcome, NewIdentity, Portfolio, Provenance, UniqueField,
};
use crate::error::AppError;
use crate::metrics::{AUTH_CALLBACKS_TOTAL, SIGNUPS_TOTAL};

use super::username::{UsernameArbiter, is_well_formed};

/// Terminal state of a provider callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Code exchange failed; user goes back to the landing page
    ExchangeFailed,
    /// Unknown email on the login flow; a handle must be collected first
    FinishSignup,
    /// Candidate handle was taken (or invalid) by the time of insert
    HandleUnavailable,
    /// Known email on the login flow
    LoggedIn,
    /// New identity created
    SignedUp,
    /// Signup resolved to the account already owning the email
    ExistingLogin { handle: String },
}

impl CallbackOutcome {
    /// Frontend path to redirect to
    pub fn redirect_path(&self) -> String {
        match self {
            CallbackOutcome::ExchangeFailed => "/".to_string(),
            CallbackOutcome::FinishSignup => "/signup?finish=true".to_string(),
            CallbackOutcome::HandleUnavailable => "/signup?error=true".to_string(),
            CallbackOutcome::LoggedIn | CallbackOutcome::SignedUp => "/editor".to_string(),
            CallbackOutcome::ExistingLogin { handle } => {
                format!("/editor?existing_login={}", urlencoding::encode(handle))
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            CallbackOutcome::ExchangeFailed => "exchange_failed",
            CallbackOutcome::FinishSignup => "finish_signup",
            CallbackOutcome::HandleUnavailable => "handle_unavailable",
            CallbackOutcome::LoggedIn => "logged_in",
            CallbackOutcome::SignedUp => "signed_up",
            CallbackOutcome::ExistingLogin { .. } => "existing_login",
        }
    }
}

/// Auth orchestrator
///
/// Holds every collaborator explicitly; nothing is reached through globals.
pub struct AuthService {
    db: Arc<Database>,
    arbiter: Arc<UsernameArbiter>,
    sessions: Arc<SessionManager>,
    provider: Arc<dyn IdentityProvider>,
    correlation: CorrelationIssuer,
}

impl AuthService {
    pub fn new(
        db: Arc<Database>,
        arbiter: Arc<UsernameArbiter>,
        sessions: Arc<SessionManager>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        let correlation = CorrelationIssuer::new(db.clone());
        Self {
            db,
            arbiter,
            sessions,
            provider,
            correlation,
        }
    }

    /// Availability of a handle, for the signup form
    pub async fn check_username(&self, handle: &str) -> Result<bool, AppError> {
        self.arbiter.is_available(handle).await
    }

    /// Start the signup flow for `handle`.
    ///
    /// # Returns
    /// Provider authorization URL carrying `<nonce>:<handle>`
    ///
    /// # Errors
    /// 400 with the rejected handle as payload if it is unavailable
    pub async fn begin_signup(&self, handle: &str) -> Result<String, AppError> {
        if !self.arbiter.is_available(handle).await? {
            return Err(AppError::Detailed {
                status: axum::http::StatusCode::BAD_REQUEST,
                message: "bad username".to_string(),
                data: serde_json::json!({ "username": handle }),
            });
        }

        let nonce = self.correlation.issue().await?;
        let state = CorrelationState::signup(nonce, handle);
        Ok(self.provider.authorization_url(&state.encode()))
    }

    /// Start the login flow.
    pub async fn begin_login(&self) -> Result<String, AppError> {
        let nonce = self.correlation.issue().await?;
        let state = CorrelationState::login(nonce);
        Ok(self.provider.authorization_url(&state.encode()))
    }

    /// Run the callback state machine.
    ///
    /// # Errors
    /// - `InvalidOAuthState` before any provider or identity lookup when the
    ///   nonce is unknown, expired, or already used
    /// - `Provider` if the email cannot be fetched
    /// - `Internal` on an email collision at insert time
    pub async fn complete_callback(
        &self,
        session: &mut Session,
        state: &str,
        code: Option<&str>,
        provenance: Provenance,
    ) -> Result<CallbackOutcome, AppError> {
        let correlation = CorrelationState::parse(state);
        if !self.correlation.consume(&correlation.secret).await? {
            tracing::warn!("Rejected OAuth callback with unknown state");
            return Err(AppError::InvalidOAuthState);
        }

        let outcome = self.resolve_callback(session, correlation, code, provenance).await?;

        AUTH_CALLBACKS_TOTAL
            .with_label_values(&[outcome.label()])
            .inc();
        tracing::info!(outcome = outcome.label(), "OAuth callback completed");
        Ok(outcome)
    }

    async fn resolve_callback(
        &self,
        session: &mut Session,
        correlation: CorrelationState,
        code: Option<&str>,
        provenance: Provenance,
    ) -> Result<CallbackOutcome, AppError> {
        let Some(code) = code.filter(|c| !c.is_empty()) else {
            return Ok(CallbackOutcome::ExchangeFailed);
        };

        let token = match self.provider.exchange(code).await {
            Ok(token) => token,
            Err(error) => {
                tracing::warn!(%error, "OAuth code exchange failed");
                return Ok(CallbackOutcome::ExchangeFailed);
            }
        };

        let email = self.provider.fetch_verified_email(&token).await?;
        let existing = self.db.find_identity_by_email(&email).await?;

        match (existing, correlation.handle) {
            (Some(identity), None) => {
                self.bind_existing(session, &identity).await?;
                Ok(CallbackOutcome::LoggedIn)
            }
            (Some(identity), Some(_)) => {
                self.bind_existing(session, &identity).await?;
                Ok(CallbackOutcome::ExistingLogin {
                    handle: identity.handle,
                })
            }
            (None, Some(handle)) => self.sign_up(session, email, handle, provenance).await,
            (None, None) => Ok(CallbackOutcome::FinishSignup),
        }
    }

    async fn bind_existing(&self, session: &mut Session, identity: &Identity) -> Result<(), AppError> {
        self.sessions
            .bind(session, &EntityId(identity.id.clone()))
            .await
    }

    async fn sign_up(
        &self,
        session: &mut Session,
        email: String,
        handle: String,
        provenance: Provenance,
    ) -> Result<CallbackOutcome, AppError> {
        if !is_well_formed(&handle) {
            tracing::warn!(handle = %handle, "Signup state carried an invalid handle");
            return Ok(CallbackOutcome::HandleUnavailable);
        }

        let candidate = NewIdentity {
            id: EntityId::new(),
            email,
            handle,
            provenance,
            portfolio: Portfolio::default(),
        };

        match self.db.insert_identity(&candidate).await? {
            InsertOutcome::Inserted => {
                SIGNUPS_TOTAL.inc();
                tracing::info!(
                    handle = %candidate.handle,
                    email = %candidate.email,
                    "Created new identity"
                );
                self.sessions.bind(session, &candidate.id).await?;
                Ok(CallbackOutcome::SignedUp)
            }
            InsertOutcome::Duplicate(UniqueField::Handle) => {
                tracing::info!(handle = %candidate.handle, "Lost handle race at signup");
                Ok(CallbackOutcome::HandleUnavailable)
            }
            InsertOutcome::Duplicate(UniqueField::Email) => Err(AppError::Internal(
                anyhow::anyhow!("email registered concurrently with signup"),
            )),
        }
    }

    /// Identity behind the session, verified to still exist.
    ///
    /// A binding to a deleted identity is cleared before returning the error.
    pub async fn current_login(&self, session: &mut Session) -> Result<EntityId, AppError> {
        let id = self.sessions.current_identity(session).await?;

        if !self.db.identity_exists(&id.0).await? {
            tracing::info!(identity_id = %id, "Clearing session bound to missing identity");
            self.sessions.clear_binding(session).await?;
            return Err(AppError::Unauthorized);
        }

        Ok(id)
    }

    pub async fn logout(&self, session: &mut Session) -> Result<(), AppError> {
        self.sessions.unbind(session).await
    }
}
