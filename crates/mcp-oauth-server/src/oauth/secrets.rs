//! Random credential generation and fixed-time comparison.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;

/// Entropy of client identifiers (128 bits).
pub const CLIENT_ID_BYTES: usize = 16;

/// Entropy of secrets, codes and refresh tokens (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Generate `len` random bytes from the OS RNG, encoded as base64url without padding.
#[must_use]
pub fn random_urlsafe(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate an opaque credential (authorization code, refresh token, client secret).
#[must_use]
pub fn generate_token() -> String {
    random_urlsafe(TOKEN_BYTES)
}

/// Generate a client identifier.
#[must_use]
pub fn generate_client_id() -> String {
    format!("client_{}", random_urlsafe(CLIENT_ID_BYTES))
}

/// Compare two strings in time independent of where they differ.
///
/// Lengths are not hidden.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
