//! Google OAuth authentication
//!
//! Handles:
//! - Google OAuth login and signup flows
//! - Server-side sessions
//! - Request extractors for the session and signup provenance

mod middleware;
mod oauth;
mod provider;
pub mod session;
mod state;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;

pub use middleware::{RequestProvenance, RequestSession};
pub use oauth::auth_router;
#[cfg(test)]
pub use provider::MockIdentityProvider;
pub use provider::{
    EMAIL_SCOPE, GoogleEndpoints, GoogleProvider, IdentityProvider, ProviderError, ProviderToken,
};
pub use session::{SESSION_COOKIE, Session, SessionManager};
pub use state::{CorrelationIssuer, CorrelationState, STATE_TTL_SECONDS};

/// 256-bit random token, base64url without padding
pub(crate) fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
