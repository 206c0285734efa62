//! Identity provider adapter
//!
//! Google OAuth 2.0 authorization code flow:
//! 1. Redirect the browser to the authorization endpoint with `state`
//! 2. Exchange the returned code for an access token
//! 3. Read the account's verified email from the userinfo endpoint

use std::time::{Duration, Instant};

use axum::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::GoogleOAuthConfig;
use crate::error::AppError;
use crate::metrics::observe_provider_request;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Only the email is read from the profile
pub const EMAIL_SCOPE: &str = "https://www.googleapis.com/auth/userinfo.email";

/// Access token returned by the token endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderToken {
    pub access_token: String,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to identity provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("identity provider responded with status {0}")]
    Status(u16),

    #[error("malformed identity provider response: {0}")]
    Malformed(String),

    #[error("identity provider email is not verified")]
    Unverified,
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        AppError::Provider(err.to_string())
    }
}

/// Third-party identity provider
///
/// Requests are not retried; callers decide how a failure is surfaced.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authorization URL embedding `state` verbatim
    fn authorization_url(&self, state: &str) -> String;

    /// Trade an authorization code for an access token
    async fn exchange(&self, code: &str) -> Result<ProviderToken, ProviderError>;

    /// Fetch the email the provider vouches for
    async fn fetch_verified_email(&self, token: &ProviderToken) -> Result<String, ProviderError>;
}

/// Endpoint set, overridable for tests
#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
        }
    }
}

/// Google implementation of [`IdentityProvider`]
pub struct GoogleProvider {
    http_client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    /// Parsed once so building a redirect cannot fail
    auth_url: url::Url,
    endpoints: GoogleEndpoints,
}

fn parse_auth_url(raw: &str) -> Result<url::Url, AppError> {
    url::Url::parse(raw)
        .map_err(|e| AppError::Config(format!("invalid authorization endpoint {raw}: {e}")))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(default)]
    email: String,
    verified_email: Option<bool>,
}

impl GoogleProvider {
    /// Create a provider client
    ///
    /// # Arguments
    /// * `config` - Google client credentials
    /// * `redirect_uri` - Callback URL registered with Google
    /// * `timeout` - Per-request timeout for token and userinfo calls
    pub fn new(
        config: &GoogleOAuthConfig,
        redirect_uri: String,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let http_client = reqwest::Client::builder()
            .user_agent("Foliopage/0.1.0")
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        let endpoints = GoogleEndpoints::default();
        Ok(Self {
            http_client,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri,
            auth_url: parse_auth_url(&endpoints.auth_url)?,
            endpoints,
        })
    }

    /// Point the provider at other endpoints.
    ///
    /// # Errors
    /// `Config` if the authorization endpoint is not an absolute URL
    pub fn with_endpoints(mut self, endpoints: GoogleEndpoints) -> Result<Self, AppError> {
        self.auth_url = parse_auth_url(&endpoints.auth_url)?;
        self.endpoints = endpoints;
        Ok(self)
    }

    async fn request_token(&self, code: &str) -> Result<ProviderToken, ProviderError> {
        let response = self
            .http_client
            .post(&self.endpoints.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        if token.access_token.is_empty() {
            return Err(ProviderError::Malformed("empty access_token".to_string()));
        }

        Ok(ProviderToken {
            access_token: token.access_token,
        })
    }

    async fn request_email(&self, token: &ProviderToken) -> Result<String, ProviderError> {
        let response = self
            .http_client
            .get(&self.endpoints.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }

        let info: UserInfo = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        if info.email.trim().is_empty() {
            return Err(ProviderError::Malformed("missing email".to_string()));
        }
        if info.verified_email == Some(false) {
            return Err(ProviderError::Unverified);
        }

        Ok(info.email)
    }
}

fn status_label<T>(result: &Result<T, ProviderError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(_) => "error",
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn authorization_url(&self, state: &str) -> String {
        let mut url = self.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", EMAIL_SCOPE)
            .append_pair("state", state);
        url.into()
    }

    async fn exchange(&self, code: &str) -> Result<ProviderToken, ProviderError> {
        let started = Instant::now();
        let result = self.request_token(code).await;
        observe_provider_request("exchange", status_label(&result), started.elapsed());
        result
    }

    async fn fetch_verified_email(&self, token: &ProviderToken) -> Result<String, ProviderError> {
        let started = Instant::now();
        let result = self.request_email(token).await;
        observe_provider_request("userinfo", status_label(&result), started.elapsed());
        result
    }
}
