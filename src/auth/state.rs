//! OAuth correlation state
//!
//! The `state` parameter sent to the provider is `<nonce>` for the login
//! entry point and `<nonce>:<handle>` for signup. The nonce is minted per
//! authorization request, stored hashed, and consumed by the first callback
//! that presents it.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::data::{Database, hash_token};
use crate::error::AppError;

/// Separator between the nonce and the candidate handle
pub const STATE_DELIMITER: char = ':';

/// How long an issued nonce stays redeemable
pub const STATE_TTL_SECONDS: i64 = 600;

/// Decoded `state` parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationState {
    pub secret: String,
    /// Candidate handle; present only for the signup flow
    pub handle: Option<String>,
}

impl CorrelationState {
    pub fn login(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            handle: None,
        }
    }

    pub fn signup(secret: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            handle: Some(handle.into()),
        }
    }

    pub fn encode(&self) -> String {
        match &self.handle {
            Some(handle) => format!("{}{}{}", self.secret, STATE_DELIMITER, handle),
            None => self.secret.clone(),
        }
    }

    /// Split on the first delimiter; everything after it is the handle.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(STATE_DELIMITER) {
            Some((secret, handle)) => Self::signup(secret, handle),
            None => Self::login(raw),
        }
    }

    pub fn is_signup(&self) -> bool {
        self.handle.is_some()
    }
}

/// Issues and redeems correlation nonces
pub struct CorrelationIssuer {
    db: Arc<Database>,
}

impl CorrelationIssuer {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Mint a fresh nonce and remember its digest.
    pub async fn issue(&self) -> Result<String, AppError> {
        let nonce = super::generate_token();
        let expires_at = (Utc::now() + Duration::seconds(STATE_TTL_SECONDS)).timestamp();
        self.db
            .insert_oauth_state(&hash_token(&nonce), expires_at)
            .await?;
        Ok(nonce)
    }

    /// Redeem a nonce. Succeeds at most once per issued value.
    pub async fn consume(&self, secret: &str) -> Result<bool, AppError> {
        if secret.is_empty() {
            return Ok(false);
        }
        self.db
            .consume_oauth_state(&hash_token(secret), Utc::now().timestamp())
            .await
    }
}
