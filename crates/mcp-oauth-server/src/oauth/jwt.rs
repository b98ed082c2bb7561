//! Self-contained HS256 access tokens.
//!
//! Access tokens are never stored. A valid signature, an unexpired `exp` and
//! an audience equal to this server are the whole proof of authorization.
//! Every rejection maps to the same `InvalidToken` so callers cannot tell a
//! forged token from an expired one.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use super::types::AccessClaims;
use crate::error::{OAuthError, OAuthResult};

const ALGORITHM: Algorithm = Algorithm::HS256;

/// A freshly minted access token.
#[derive(Debug, Clone)]
pub struct MintedToken {
    pub access_token: String,
    pub expires_in: u64,
    pub claims: AccessClaims,
}

/// Mints and verifies access tokens for one issuer.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    lifetime_secs: i64,
}

impl TokenIssuer {
    /// Create an issuer whose `iss` and `aud` are both `issuer`.
    #[must_use]
    pub fn new(secret: &[u8], issuer: impl Into<String>, lifetime: Duration) -> Self {
        let issuer = issuer.into();

        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.set_audience(&[issuer.as_str()]);
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "aud", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            issuer,
            lifetime_secs: i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX),
        }
    }

    /// Override the token lifetime in seconds. Negative values mint tokens
    /// that are already expired.
    #[must_use]
    pub fn with_lifetime_secs(mut self, seconds: i64) -> Self {
        self.lifetime_secs = seconds;
        self
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Mint a signed access token.
    pub fn mint(&self, client_id: &str, subject: &str, scope: &str) -> OAuthResult<MintedToken> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: subject.to_owned(),
            client_id: client_id.to_owned(),
            scope: scope.to_owned(),
            iss: self.issuer.clone(),
            aud: self.issuer.clone(),
            iat: now,
            exp: now.saturating_add(self.lifetime_secs),
            jti: uuid::Uuid::new_v4().simple().to_string(),
        };

        let access_token =
            encode(&Header::new(ALGORITHM), &claims, &self.encoding_key).map_err(|err| {
                tracing::error!(error = %err, "Failed to sign access token");
                OAuthError::ServerError
            })?;

        Ok(MintedToken {
            access_token,
            expires_in: u64::try_from(self.lifetime_secs).unwrap_or(0),
            claims,
        })
    }

    /// Verify a presented access token and return its claims.
    ///
    /// Rejects when `now >= exp`, with no clock-skew allowance.
    pub fn verify(&self, token: &str) -> OAuthResult<AccessClaims> {
        let data = decode::<AccessClaims>(token, &self.decoding_key, &self.validation).map_err(
            |err| {
                tracing::debug!(error = %err, "Access token rejected");
                OAuthError::InvalidToken
            },
        )?;

        if Utc::now().timestamp() >= data.claims.exp {
            tracing::debug!("Access token rejected at expiry boundary");
            return Err(OAuthError::InvalidToken);
        }

        Ok(data.claims)
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &self.issuer)
            .field("lifetime_secs", &self.lifetime_secs)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"unit-test-secret";
    const ISSUER: &str = "https://auth.example.com";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(SECRET, ISSUER, Duration::from_secs(3600))
    }

    #[test]
    fn test_mint_and_verify() {
        let issuer = issuer();
        let minted = issuer.mint("client1", "user1", "mcp:tools:read").unwrap();
        assert_eq!(minted.expires_in, 3600);
        assert_eq!(minted.access_token.split('.').count(), 3);

        let claims = issuer.verify(&minted.access_token).unwrap();
        assert_eq!(claims, minted.claims);
        assert_eq!(claims.sub, "user1");
        assert_eq!(claims.client_id, "client1");
        assert_eq!(claims.scope, "mcp:tools:read");
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.aud, ISSUER);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_tokens_are_distinct() {
        let issuer = issuer();
        let a = issuer.mint("c", "u", "s").unwrap();
        let b = issuer.mint("c", "u", "s").unwrap();
        assert_ne!(a.access_token, b.access_token);
    }

    #[test]
    fn test_expired_token_rejected() {
        let expired = issuer().with_lifetime_secs(-1);
        let minted = expired.mint("client1", "user1", "mcp").unwrap();
        assert_eq!(minted.expires_in, 0);
        assert_eq!(issuer().verify(&minted.access_token).unwrap_err(), OAuthError::InvalidToken);
    }

    #[test]
    fn test_zero_lifetime_rejected() {
        let issuer = issuer().with_lifetime_secs(0);
        let minted = issuer.mint("client1", "user1", "mcp").unwrap();
        assert_eq!(issuer.verify(&minted.access_token).unwrap_err(), OAuthError::InvalidToken);
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let issuer = issuer();
        let minted = issuer.mint("client1", "user1", "mcp").unwrap();
        let (signed, signature) = minted.access_token.rsplit_once('.').unwrap();
        let flipped = if signature.starts_with('A') { 'B' } else { 'A' };
        let tampered = format!("{signed}.{flipped}{}", &signature[1..]);

        assert_eq!(issuer.verify(&tampered).unwrap_err(), OAuthError::InvalidToken);
    }

    #[test]
    fn test_wrong_audience_rejected() {
        let other = TokenIssuer::new(SECRET, "https://other.example.com", Duration::from_secs(60));
        let minted = other.mint("client1", "user1", "mcp").unwrap();
        assert_eq!(issuer().verify(&minted.access_token).unwrap_err(), OAuthError::InvalidToken);
    }

    #[test]
    fn test_wrong_key_rejected() {
        let other = TokenIssuer::new(b"another-secret", ISSUER, Duration::from_secs(60));
        let minted = other.mint("client1", "user1", "mcp").unwrap();
        assert_eq!(issuer().verify(&minted.access_token).unwrap_err(), OAuthError::InvalidToken);
    }

    #[test]
    fn test_garbage_rejected() {
        assert_eq!(issuer().verify("not-a-jwt").unwrap_err(), OAuthError::InvalidToken);
        assert_eq!(issuer().verify("").unwrap_err(), OAuthError::InvalidToken);
    }
}
