//! PKCE parameters (RFC 7636)

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use rand::distr::Alphanumeric;
use sha2::{Digest, Sha256};

/// Length of the CSRF `state` token
pub const STATE_LEN: usize = 20;

/// Length of the code verifier; the identity provider requires 43..=128
pub const VERIFIER_LEN: usize = 43;

/// Parameters for one authorization attempt
#[derive(Clone)]
pub struct PkceParams {
    /// CSRF state sent to `/authorize`
    pub state: String,
    /// Secret verifier sent with the token exchange
    pub code_verifier: String,
    /// `base64url(sha256(code_verifier))`
    pub code_challenge: String,
}

impl PkceParams {
    /// Draw a fresh state and verifier and compute the challenge
    #[must_use]
    pub fn generate() -> Self {
        let state = random_alphanumeric(STATE_LEN);
        let code_verifier = random_alphanumeric(VERIFIER_LEN);
        let code_challenge = code_challenge(&code_verifier);

        Self {
            state,
            code_verifier,
            code_challenge,
        }
    }
}

impl std::fmt::Debug for PkceParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceParams")
            .field("state", &self.state)
            .field("code_verifier", &"[redacted]")
            .field("code_challenge", &self.code_challenge)
            .finish()
    }
}

/// S256 challenge for a verifier
#[must_use]
pub fn code_challenge(code_verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()))
}

fn random_alphanumeric(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn lengths_and_alphabet() {
        let params = PkceParams::generate();
        assert_eq!(params.state.len(), STATE_LEN);
        assert_eq!(params.code_verifier.len(), VERIFIER_LEN);
        assert!(params.state.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(params.code_verifier.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn challenge_is_sha256_of_verifier() {
        for _ in 0..50 {
            let params = PkceParams::generate();
            let expected = URL_SAFE_NO_PAD.encode(Sha256::digest(params.code_verifier.as_bytes()));
            assert_eq!(params.code_challenge, expected);
            // 32 byte digest -> 43 unpadded base64url chars
            assert_eq!(params.code_challenge.len(), 43);
            assert!(!params.code_challenge.contains('='));
            assert!(!params.code_challenge.contains('+'));
            assert!(!params.code_challenge.contains('/'));
        }
    }

    #[test]
    fn known_challenge_vector() {
        // Appendix B of RFC 7636
        assert_eq!(
            code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn no_collisions_over_many_calls() {
        let mut states = HashSet::new();
        let mut verifiers = HashSet::new();
        for _ in 0..1000 {
            let params = PkceParams::generate();
            assert!(states.insert(params.state));
            assert!(verifiers.insert(params.code_verifier));
        }
    }

    #[test]
    fn debug_hides_verifier() {
        let params = PkceParams::generate();
        let rendered = format!("{params:?}");
        assert!(!rendered.contains(&params.code_verifier));
    }
}
