//! PKCE (Proof Key for Code Exchange) per RFC 7636.
//!
//! The server side computes and verifies challenges; `generate_code_verifier`
//! is provided for clients.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use super::secrets::{constant_time_eq, random_urlsafe};
use super::types::PkceMethod;

/// Minimum verifier length (RFC 7636 §4.1).
pub const MIN_VERIFIER_LEN: usize = 43;
/// Maximum verifier length (RFC 7636 §4.1).
pub const MAX_VERIFIER_LEN: usize = 128;

/// Compute the challenge for a verifier.
///
/// S256 is `BASE64URL(SHA256(verifier))` without padding; plain is the verifier itself.
#[must_use]
pub fn challenge_from_verifier(code_verifier: &str, method: PkceMethod) -> String {
    match method {
        PkceMethod::S256 => URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes())),
        PkceMethod::Plain => code_verifier.to_string(),
    }
}

/// Verify a verifier against a stored challenge in constant time.
#[must_use]
pub fn verify(code_verifier: &str, code_challenge: &str, method: PkceMethod) -> bool {
    let computed = challenge_from_verifier(code_verifier, method);
    constant_time_eq(&computed, code_challenge)
}

/// Check verifier length and alphabet (`[A-Za-z0-9-._~]{43,128}`).
#[must_use]
pub fn is_valid_verifier(code_verifier: &str) -> bool {
    (MIN_VERIFIER_LEN..=MAX_VERIFIER_LEN).contains(&code_verifier.len())
        && code_verifier
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
}

/// Check the shape of a challenge presented at the authorization endpoint.
///
/// An S256 challenge is exactly 43 base64url characters; a plain challenge
/// follows the verifier rules.
#[must_use]
pub fn is_valid_challenge(code_challenge: &str, method: PkceMethod) -> bool {
    match method {
        PkceMethod::S256 => {
            code_challenge.len() == 43
                && code_challenge.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_'))
        }
        PkceMethod::Plain => is_valid_verifier(code_challenge),
    }
}

/// Generate a random 64-character code verifier.
#[must_use]
pub fn generate_code_verifier() -> String {
    // 48 bytes -> 64 base64url chars
    random_urlsafe(48)
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 7636 Appendix B test vector
    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    #[test]
    fn test_s256_rfc_vector() {
        assert_eq!(challenge_from_verifier(VERIFIER, PkceMethod::S256), CHALLENGE);
        assert!(verify(VERIFIER, CHALLENGE, PkceMethod::S256));
    }

    #[test]
    fn test_s256_invalid_verifier() {
        assert!(!verify("wrong-verifier", CHALLENGE, PkceMethod::S256));
    }

    #[test]
    fn test_s256_invalid_challenge() {
        assert!(!verify(VERIFIER, "wrong-challenge", PkceMethod::S256));
    }

    #[test]
    fn test_plain_method() {
        assert_eq!(challenge_from_verifier(VERIFIER, PkceMethod::Plain), VERIFIER);
        assert!(verify(VERIFIER, VERIFIER, PkceMethod::Plain));
        // An S256 challenge does not verify under plain
        assert!(!verify(VERIFIER, CHALLENGE, PkceMethod::Plain));
    }

    #[test]
    fn test_unknown_method_rejected() {
        assert_eq!("S256".parse::<PkceMethod>(), Ok(PkceMethod::S256));
        assert!("S512".parse::<PkceMethod>().is_err());
        assert!("PLAIN".parse::<PkceMethod>().is_err());
    }

    #[test]
    fn test_verifier_format() {
        assert!(is_valid_verifier(VERIFIER));
        assert!(!is_valid_verifier("short"));
        assert!(!is_valid_verifier(&"a".repeat(129)));
        assert!(!is_valid_verifier(&format!("{}!", "a".repeat(50))));
    }

    #[test]
    fn test_challenge_format() {
        assert!(is_valid_challenge(CHALLENGE, PkceMethod::S256));
        assert!(!is_valid_challenge("abc", PkceMethod::S256));
        assert!(!is_valid_challenge(&format!("{}=", &CHALLENGE[..42]), PkceMethod::S256));
        assert!(is_valid_challenge(VERIFIER, PkceMethod::Plain));
        assert!(!is_valid_challenge("abc", PkceMethod::Plain));
    }

    #[test]
    fn test_generated_verifier_is_valid() {
        let verifier = generate_code_verifier();
        assert_eq!(verifier.len(), 64);
        assert!(is_valid_verifier(&verifier));
        assert_ne!(verifier, generate_code_verifier());
    }
}
