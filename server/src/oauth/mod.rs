//! OAuth module for the Spotify authorization code + PKCE flow:
//! verifier/challenge generation, the cookie-bound login state, and the
//! token-endpoint exchanges.

pub mod pkce;
pub mod token;

pub use token::{exchange_code_for_token, refresh_access_token, TokenResponse};

use serde::{Deserialize, Serialize};

use crate::session::{unix_now, DecodeError, SessionKey};

/// Cookie name for the in-flight login state
pub const LOGIN_COOKIE_NAME: &str = "pkce_verifier";

/// How long a login attempt stays valid, in seconds
pub const LOGIN_MAX_AGE_SECS: u64 = 600;

/// Context string for login-state tokens, distinct from the session context
const LOGIN_CONTEXT: &str = "soundprint-login-v1";

/// One in-flight login attempt, held client-side in a short-lived signed
/// cookie between `/login` and `/callback`. Binds the PKCE verifier and the
/// CSRF state value to the browser that started the flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginState {
    /// PKCE code verifier, presented to the token endpoint exactly once
    pub verifier: String,
    /// Random value echoed back by the provider; must match on callback
    pub state: String,
    /// When this attempt started (Unix timestamp)
    pub created_at: u64,
}

impl LoginState {
    pub fn new(verifier: String) -> Self {
        Self {
            verifier,
            state: pkce::random_state(),
            created_at: unix_now(),
        }
    }

    /// A login attempt older than its cookie lifetime is dead even if the
    /// browser still presents the cookie
    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.created_at + LOGIN_MAX_AGE_SECS
    }
}

impl SessionKey {
    /// Encode a login state into a signed cookie value
    pub fn encode_login_state(&self, login: &LoginState) -> color_eyre::Result<String> {
        let payload = serde_json::to_vec(login)?;
        Ok(self.sign(LOGIN_CONTEXT, &payload))
    }

    /// Decode and verify a login-state cookie value
    pub fn decode_login_state(&self, token: &str) -> Result<LoginState, DecodeError> {
        let payload = self.verify(LOGIN_CONTEXT, token)?;
        serde_json::from_slice(&payload).map_err(|_| DecodeError::MalformedPayload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_state_round_trips() {
        let key = SessionKey::new(b"test-secret");
        let login = LoginState::new("a-verifier".to_string());

        let token = key.encode_login_state(&login).unwrap();
        let decoded = key.decode_login_state(&token).unwrap();

        assert_eq!(decoded.verifier, login.verifier);
        assert_eq!(decoded.state, login.state);
        assert_eq!(decoded.created_at, login.created_at);
    }

    #[test]
    fn login_state_is_not_a_valid_session() {
        let key = SessionKey::new(b"test-secret");
        let login = LoginState::new("a-verifier".to_string());
        let token = key.encode_login_state(&login).unwrap();

        // Same key, different context: a login token must never decode as a session
        assert!(key.decode_session(&token).is_err());
    }

    #[test]
    fn login_state_expires_after_its_window() {
        let login = LoginState {
            verifier: "v".to_string(),
            state: "s".to_string(),
            created_at: 1_700_000_000,
        };

        assert!(!login.is_expired_at(1_700_000_000 + LOGIN_MAX_AGE_SECS - 1));
        assert!(login.is_expired_at(1_700_000_000 + LOGIN_MAX_AGE_SECS));
    }

    #[test]
    fn fresh_login_states_get_distinct_csrf_values() {
        let a = LoginState::new("v".to_string());
        let b = LoginState::new("v".to_string());
        assert_ne!(a.state, b.state);
    }
}
