use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{thread_rng, RngCore};
use sha2::{Digest, Sha256};

/// PKCE challenge method tag sent to the provider
pub const CHALLENGE_METHOD: &str = "S256";

/// A fresh PKCE verifier/challenge pair. The verifier is the secret half and
/// only ever travels in the login-state cookie; the challenge is the public
/// half sent with the authorization request.
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    /// Generate a pair from fresh CSPRNG output. 64 random bytes encode to an
    /// 86-char verifier, inside the 43-128 window the PKCE spec allows.
    pub fn generate() -> Self {
        let mut verifier_bytes = [0u8; 64];
        thread_rng().fill_bytes(&mut verifier_bytes);

        let verifier = Base64UrlUnpadded::encode_string(&verifier_bytes);
        let challenge = challenge_s256(&verifier);

        Self {
            verifier,
            challenge,
        }
    }
}

/// Derive the S256 challenge for a verifier:
/// `base64url_nopad(SHA256(verifier))`
pub fn challenge_s256(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    let hashed = hasher.finalize();
    Base64UrlUnpadded::encode_string(&hashed)
}

/// Random CSRF state value bound into the login-state cookie
pub fn random_state() -> String {
    let mut bytes = [0u8; 32];
    thread_rng().fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_length_is_inside_the_pkce_window() {
        let pair = PkcePair::generate();
        assert!(pair.verifier.len() >= 43);
        assert!(pair.verifier.len() <= 128);
    }

    #[test]
    fn challenge_derivation_is_deterministic() {
        let pair = PkcePair::generate();
        assert_eq!(pair.challenge, challenge_s256(&pair.verifier));
        assert_eq!(challenge_s256(&pair.verifier), challenge_s256(&pair.verifier));
    }

    #[test]
    fn known_vector_matches_independent_computation() {
        // base64url_nopad(SHA256("abc123")) computed outside this codebase
        assert_eq!(
            challenge_s256("abc123"),
            "bKE9UspwyIPg8LsQHkJaiehiTeUdstI5JZOvaoQRgJA"
        );
    }

    #[test]
    fn verifiers_are_never_reused() {
        let a = PkcePair::generate();
        let b = PkcePair::generate();
        assert_ne!(a.verifier, b.verifier);
        assert_ne!(a.challenge, b.challenge);
    }

    #[test]
    fn encoding_is_unpadded_urlsafe() {
        let pair = PkcePair::generate();
        for value in [&pair.verifier, &pair.challenge] {
            assert!(!value.contains('='));
            assert!(!value.contains('+'));
            assert!(!value.contains('/'));
        }
    }
}
