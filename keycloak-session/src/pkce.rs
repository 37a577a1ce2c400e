use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use sha2::{Digest, Sha256};

/// A PKCE code verifier (RFC 7636). The verifier is minted before the
/// redirect to the authorization endpoint and must be presented again during
/// the code-for-token exchange after the round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CodeVerifier {
    secret: String,
}

impl CodeVerifier {
    /// Generates a fresh, cryptographically random verifier.
    /// 48 random bytes encode to a 64-character URL-safe string, well within
    /// the 43..=128 character range the RFC allows.
    pub(crate) fn generate() -> Self {
        let random_bytes: [u8; 48] = rand::rng().random();
        Self {
            secret: URL_SAFE_NO_PAD.encode(random_bytes),
        }
    }

    /// Rehydrates a verifier persisted across the login redirect.
    pub(crate) fn restore(secret: String) -> Self {
        Self { secret }
    }

    /// The S256 challenge sent along with the authorization request:
    /// `BASE64URL(SHA256(verifier))`.
    pub(crate) fn challenge(&self) -> String {
        let digest = Sha256::digest(self.secret.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    pub(crate) fn secret(&self) -> &str {
        &self.secret
    }
}

/// A random `state` value binding an authorization response to the request
/// that initiated it.
pub(crate) fn generate_state() -> String {
    let random_bytes: [u8; 16] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertr::prelude::*;

    #[test]
    fn verifier_has_rfc_conforming_length() {
        let verifier = CodeVerifier::generate();
        assert_that(verifier.secret()).has_length(64);
    }

    #[test]
    fn verifier_uses_the_url_safe_alphabet() {
        let verifier = CodeVerifier::generate();
        let url_safe = verifier
            .secret()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        assert_that(url_safe).is_true();
    }

    #[test]
    fn two_verifiers_differ() {
        assert_that(CodeVerifier::generate() == CodeVerifier::generate()).is_false();
    }

    #[test]
    fn challenge_matches_the_rfc_7636_appendix_b_vector() {
        let verifier =
            CodeVerifier::restore("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_owned());
        assert_that(verifier.challenge().as_str())
            .is_equal_to("E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn challenge_has_sha256_length() {
        let challenge = CodeVerifier::generate().challenge();
        assert_that(challenge).has_length(43);
    }

    #[test]
    fn state_values_are_random_and_url_safe() {
        let state = generate_state();
        assert_that(state.len()).is_equal_to(22);
        assert_that(state == generate_state()).is_false();
    }
}
