//! OAuth 2.0 records held by the in-memory stores.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// `now + ttl`, saturating at the far future.
#[must_use]
pub fn expires_after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Grant types understood by the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    RefreshToken,
}

impl GrantType {
    pub const ALL: [Self; 2] = [Self::AuthorizationCode, Self::RefreshToken];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl FromStr for GrantType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorization_code" => Ok(Self::AuthorizationCode),
            "refresh_token" => Ok(Self::RefreshToken),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PKCE code challenge methods (RFC 7636 §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PkceMethod {
    #[default]
    S256,
    #[serde(rename = "plain")]
    Plain,
}

impl PkceMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::S256 => "S256",
            Self::Plain => "plain",
        }
    }
}

impl FromStr for PkceMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "S256" => Ok(Self::S256),
            "plain" => Ok(Self::Plain),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for PkceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dynamically registered OAuth client.
#[derive(Clone)]
pub struct RegisteredClient {
    pub client_id: String,
    /// `None` for public clients.
    pub client_secret: Option<String>,
    pub redirect_uris: Vec<String>,
    pub client_name: Option<String>,
    pub client_uri: Option<String>,
    pub scope: String,
    pub grant_types: Vec<GrantType>,
    pub response_types: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl RegisteredClient {
    /// Exact-match check against the registered redirect URIs.
    #[must_use]
    pub fn allows_redirect(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == redirect_uri)
    }

    #[must_use]
    pub const fn is_confidential(&self) -> bool {
        self.client_secret.is_some()
    }

    #[must_use]
    pub fn allows_grant(&self, grant_type: GrantType) -> bool {
        self.grant_types.contains(&grant_type)
    }

    /// Auth method advertised back to the client at registration.
    #[must_use]
    pub const fn token_endpoint_auth_method(&self) -> &'static str {
        if self.is_confidential() { "client_secret_post" } else { "none" }
    }
}

impl fmt::Debug for RegisteredClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredClient")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[redacted]"))
            .field("redirect_uris", &self.redirect_uris)
            .field("client_name", &self.client_name)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// An authorization code issued after user approval.
#[derive(Debug, Clone)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub code_challenge: String,
    pub code_challenge_method: PkceMethod,
    pub subject: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

impl AuthorizationCode {
    /// Expired once `now` reaches `expires_at`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A refresh token for obtaining new access tokens.
#[derive(Clone)]
pub struct RefreshToken {
    pub token: String,
    pub client_id: String,
    pub subject: String,
    pub scope: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl RefreshToken {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Usable for minting: neither expired nor revoked.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.is_expired_at(now)
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshToken")
            .field("client_id", &self.client_id)
            .field("subject", &self.subject)
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .field("revoked", &self.revoked)
            .finish_non_exhaustive()
    }
}

/// Claims carried by a signed access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub client_id: String,
    pub scope: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique token id; two tokens minted in the same second still differ.
    pub jti: String,
}

impl AccessClaims {
    /// Space-separated scope check by exact string match.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.split_whitespace().any(|s| s == scope)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_grant_type_parse() {
        assert_eq!("authorization_code".parse::<GrantType>(), Ok(GrantType::AuthorizationCode));
        assert_eq!("refresh_token".parse::<GrantType>(), Ok(GrantType::RefreshToken));
        assert!("password".parse::<GrantType>().is_err());
    }

    #[test]
    fn test_pkce_method_parse_is_case_sensitive() {
        assert_eq!("S256".parse::<PkceMethod>(), Ok(PkceMethod::S256));
        assert_eq!("plain".parse::<PkceMethod>(), Ok(PkceMethod::Plain));
        assert!("s256".parse::<PkceMethod>().is_err());
    }

    #[test]
    fn test_code_expiry_boundary() {
        let now = Utc::now();
        let code = AuthorizationCode {
            code: "c".into(),
            client_id: "client".into(),
            redirect_uri: "https://a/cb".into(),
            scope: String::new(),
            code_challenge: "x".into(),
            code_challenge_method: PkceMethod::S256,
            subject: "user".into(),
            expires_at: now,
            used: false,
        };
        assert!(code.is_expired_at(now));
        assert!(!code.is_expired_at(now - Duration::seconds(1)));
    }

    #[test]
    fn test_expires_after_saturates() {
        let now = Utc::now();
        assert_eq!(expires_after(now, std::time::Duration::ZERO), now);
        assert_eq!(expires_after(now, std::time::Duration::MAX), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let client = RegisteredClient {
            client_id: "client_1".into(),
            client_secret: Some("super-secret".into()),
            redirect_uris: vec!["https://a/cb".into()],
            client_name: None,
            client_uri: None,
            scope: "mcp".into(),
            grant_types: GrantType::ALL.to_vec(),
            response_types: vec!["code".into()],
            created_at: Utc::now(),
        };
        let debug = format!("{client:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[redacted]"));
    }

    #[test]
    fn test_has_scope() {
        let claims = AccessClaims {
            sub: "u".into(),
            client_id: "c".into(),
            scope: "mcp:tools:read mcp:tools:execute".into(),
            iss: "https://a".into(),
            aud: "https://a".into(),
            iat: 0,
            exp: 1,
            jti: "id".into(),
        };
        assert!(claims.has_scope("mcp:tools:read"));
        assert!(!claims.has_scope("mcp:tools"));
    }
}
