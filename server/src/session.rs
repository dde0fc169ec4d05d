use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::hmac;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::cookies::CookieJar;
use crate::oauth::TokenResponse;
use crate::state::AppState;

/// Cookie name for the signed session token
pub const SESSION_COOKIE_NAME: &str = "session";

/// Default session cookie lifetime in days
pub const SESSION_DURATION_DAYS: i64 = 7;

/// Context string mixed into the session MAC so session tokens can never be
/// replayed as login-state tokens (or any other signed artifact we add later)
const SESSION_CONTEXT: &str = "soundprint-session-v1";

/// Access token lifetime Spotify uses when the token response omits `expires_in`
const DEFAULT_EXPIRES_IN: u64 = 3600;

/// An authenticated Spotify session, held entirely by the browser in a signed
/// cookie. The payload is signed, not encrypted: nothing may go in here that
/// the client is not already entitled to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token for Spotify API requests
    pub access_token: String,
    /// Refresh token for minting a new access token, when the provider issued one
    pub refresh_token: Option<String>,
    /// When the access token expires (Unix timestamp, computed server-side at mint time)
    pub expires_at: u64,
    /// The scopes granted to this token
    pub scope: String,
    /// The token type (normally "Bearer")
    pub token_type: String,
}

impl Session {
    /// Mint a session from a provider token response. `expires_at` is always
    /// `now + expires_in` computed here, never trusted from anywhere else.
    pub fn from_token_response(response: TokenResponse, now: u64) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: now + response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN),
            scope: response.scope.unwrap_or_default(),
            token_type: response
                .token_type
                .unwrap_or_else(|| "Bearer".to_string()),
        }
    }

    /// Check whether the access token has expired as of `now`
    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

/// Failure kinds for [`SessionKey::decode_session`]. Expiry is deliberately
/// not one of them: the codec only vouches for integrity, and callers enforce
/// expiry themselves so "valid but expired" stays distinguishable from
/// "tampered with".
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("token signature did not verify")]
    InvalidSignature,
    #[error("token payload is malformed")]
    MalformedPayload,
}

/// HMAC-SHA256 signing key for cookie-held tokens. Constructed once at
/// startup from `SESSION_SECRET` and injected through [`AppState`] so tests
/// can swap in their own secret.
#[derive(Clone)]
pub struct SessionKey {
    key: hmac::Key,
}

impl SessionKey {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
        }
    }

    /// Sign an opaque payload under a context string, producing
    /// `base64url(payload) "." base64url(mac)`
    pub fn sign(&self, context: &str, payload: &[u8]) -> String {
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
        let tag = hmac::sign(&self.key, mac_input(context, &payload_b64).as_bytes());
        let tag_b64 = URL_SAFE_NO_PAD.encode(tag.as_ref());
        format!("{payload_b64}.{tag_b64}")
    }

    /// Verify a token signed with [`SessionKey::sign`] and return its payload.
    /// Any framing or MAC failure is an integrity failure; only a payload
    /// that verified but does not decode is `MalformedPayload`.
    pub fn verify(&self, context: &str, token: &str) -> Result<Vec<u8>, DecodeError> {
        let (payload_b64, tag_b64) = token
            .split_once('.')
            .ok_or(DecodeError::InvalidSignature)?;

        let tag = URL_SAFE_NO_PAD
            .decode(tag_b64)
            .map_err(|_| DecodeError::InvalidSignature)?;

        hmac::verify(
            &self.key,
            mac_input(context, payload_b64).as_bytes(),
            &tag,
        )
        .map_err(|_| DecodeError::InvalidSignature)?;

        URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| DecodeError::MalformedPayload)
    }

    /// Encode a session into a signed cookie value
    pub fn encode_session(&self, session: &Session) -> color_eyre::Result<String> {
        let payload = serde_json::to_vec(session)?;
        Ok(self.sign(SESSION_CONTEXT, &payload))
    }

    /// Decode and verify a session cookie value. Does NOT check expiry.
    pub fn decode_session(&self, token: &str) -> Result<Session, DecodeError> {
        let payload = self.verify(SESSION_CONTEXT, token)?;
        serde_json::from_slice(&payload).map_err(|_| DecodeError::MalformedPayload)
    }
}

/// Current Unix timestamp in seconds
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Read and validate the session from the request cookies. Absent, tampered,
/// malformed, and expired cookies all collapse to `None`; an invalid session
/// is indistinguishable from no session and is never an error to the caller.
pub fn current_session(cookies: &CookieJar, key: &SessionKey) -> Option<Session> {
    let cookie = cookies.get(SESSION_COOKIE_NAME)?;

    let session = match key.decode_session(cookie.value()) {
        Ok(session) => session,
        Err(err) => {
            info!("Rejecting session cookie: {err}");
            return None;
        }
    };

    if session.is_expired_at(unix_now()) {
        info!(
            "Session expired at {}, treating as anonymous",
            session.expires_at
        );
        return None;
    }

    Some(session)
}

/// Extract the session from the request if one is present and still valid
pub struct OptionalSession(pub Option<Session>);

#[async_trait::async_trait]
impl FromRequestParts<AppState> for OptionalSession {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookies = match CookieJar::from_request_parts(parts, state).await {
            Ok(cookies) => cookies,
            Err(_) => {
                error!("Failed to extract cookies from request");
                return Err(StatusCode::INTERNAL_SERVER_ERROR.into_response());
            }
        };

        Ok(OptionalSession(current_session(
            &cookies,
            &state.session_key,
        )))
    }
}

fn mac_input(context: &str, payload_b64: &str) -> String {
    format!("{context}:{payload_b64}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> SessionKey {
        SessionKey::new(b"test-secret-do-not-use-in-production")
    }

    fn sample_session(expires_at: u64) -> Session {
        Session {
            access_token: "sample-access-token".to_string(),
            refresh_token: Some("sample-refresh-token".to_string()),
            expires_at,
            scope: "user-top-read".to_string(),
            token_type: "Bearer".to_string(),
        }
    }

    #[test]
    fn encode_decode_round_trips() {
        let key = test_key();
        let session = sample_session(1_900_000_000);

        let token = key.encode_session(&session).unwrap();
        let decoded = key.decode_session(&token).unwrap();

        assert_eq!(decoded, session);
    }

    #[test]
    fn any_single_bit_flip_fails_with_invalid_signature() {
        let key = test_key();
        let token = key.encode_session(&sample_session(1_900_000_000)).unwrap();
        let bytes = token.as_bytes();

        for i in 0..bytes.len() {
            for bit in 0..7 {
                let mut corrupted = bytes.to_vec();
                corrupted[i] ^= 1 << bit;
                let Ok(corrupted) = String::from_utf8(corrupted) else {
                    continue;
                };
                if corrupted == token {
                    continue;
                }

                let err = key.decode_session(&corrupted).unwrap_err();
                assert!(
                    matches!(err, DecodeError::InvalidSignature),
                    "flipping bit {bit} of byte {i} gave {err:?}"
                );
            }
        }
    }

    #[test]
    fn wrong_key_fails_with_invalid_signature() {
        let token = test_key()
            .encode_session(&sample_session(1_900_000_000))
            .unwrap();

        let other = SessionKey::new(b"a-different-secret");
        assert!(matches!(
            other.decode_session(&token),
            Err(DecodeError::InvalidSignature)
        ));
    }

    #[test]
    fn context_strings_are_not_interchangeable() {
        let key = test_key();
        let token = key.sign("context-a", b"payload");

        assert!(key.verify("context-a", &token).is_ok());
        assert!(matches!(
            key.verify("context-b", &token),
            Err(DecodeError::InvalidSignature)
        ));
    }

    #[test]
    fn valid_signature_over_garbage_payload_is_malformed() {
        let key = test_key();
        let token = key.sign(SESSION_CONTEXT, b"not json at all");

        assert!(matches!(
            key.decode_session(&token),
            Err(DecodeError::MalformedPayload)
        ));
    }

    #[test]
    fn token_without_separator_is_rejected() {
        let key = test_key();
        assert!(matches!(
            key.decode_session("nodothere"),
            Err(DecodeError::InvalidSignature)
        ));
    }

    #[test]
    fn expiry_is_enforced_above_the_codec() {
        let key = test_key();
        let t0 = 1_700_000_000;
        let session = sample_session(t0 + 3600);
        let token = key.encode_session(&session).unwrap();

        // The codec itself is happy with an expired session
        let decoded = key.decode_session(&token).unwrap();

        assert!(!decoded.is_expired_at(t0 + 3599));
        assert!(decoded.is_expired_at(t0 + 3600));
        assert!(decoded.is_expired_at(t0 + 3601));
    }

    #[test]
    fn mint_computes_expiry_from_expires_in() {
        let t0 = 1_700_000_000;
        let session = Session::from_token_response(
            TokenResponse {
                access_token: "tok".to_string(),
                refresh_token: None,
                expires_in: Some(3600),
                scope: Some("user-top-read".to_string()),
                token_type: Some("Bearer".to_string()),
            },
            t0,
        );

        assert_eq!(session.expires_at, t0 + 3600);
    }

    #[test]
    fn mint_defaults_missing_fields() {
        let t0 = 1_700_000_000;
        let session = Session::from_token_response(
            TokenResponse {
                access_token: "tok".to_string(),
                refresh_token: None,
                expires_in: None,
                scope: None,
                token_type: None,
            },
            t0,
        );

        assert_eq!(session.expires_at, t0 + 3600);
        assert_eq!(session.token_type, "Bearer");
        assert_eq!(session.scope, "");
    }
}
