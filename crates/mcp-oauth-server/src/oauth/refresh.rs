//! Long-lived refresh tokens.
//!
//! Tokens are reusable until they expire or are revoked. Revocation is
//! permanent. Lookups collapse unknown, expired and revoked into `None`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;

use super::secrets::generate_token;
use super::types::{RefreshToken, expires_after};

/// In-memory refresh token store.
#[derive(Clone, Default)]
pub struct RefreshTokenStore {
    tokens: Arc<RwLock<HashMap<String, RefreshToken>>>,
}

impl RefreshTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new refresh token valid for `ttl`.
    pub async fn issue(&self, client_id: &str, subject: &str, scope: &str, ttl: Duration) -> String {
        let token = generate_token();
        let record = RefreshToken {
            token: token.clone(),
            client_id: client_id.to_owned(),
            subject: subject.to_owned(),
            scope: scope.to_owned(),
            expires_at: expires_after(Utc::now(), ttl),
            revoked: false,
        };

        self.tokens.write().await.insert(token.clone(), record);
        token
    }

    /// Look up an active token.
    pub async fn lookup(&self, token: &str) -> Option<RefreshToken> {
        let now = Utc::now();
        let tokens = self.tokens.read().await;
        tokens.get(token).filter(|record| record.is_active_at(now)).cloned()
    }

    /// Owning client of a known token, whether or not it is still active.
    pub async fn client_of(&self, token: &str) -> Option<String> {
        self.tokens.read().await.get(token).map(|record| record.client_id.clone())
    }

    /// Revoke a token. Idempotent; returns the record if the token was known.
    pub async fn revoke(&self, token: &str) -> Option<RefreshToken> {
        let mut tokens = self.tokens.write().await;
        let record = tokens.get_mut(token)?;
        record.revoked = true;
        Some(record.clone())
    }

    /// Drop every expired token. Revoked tokens stay until expiry.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, record| !record.is_expired_at(now));
        before - tokens.len()
    }

    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }
}

impl std::fmt::Debug for RefreshTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshTokenStore").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MONTH: Duration = Duration::from_secs(30 * 24 * 3600);

    #[tokio::test]
    async fn test_lookup_is_repeatable() {
        let store = RefreshTokenStore::new();
        let token = store.issue("client1", "user", "mcp:tools:read", MONTH).await;

        for _ in 0..3 {
            let record = store.lookup(&token).await.unwrap();
            assert_eq!(record.client_id, "client1");
            assert_eq!(record.subject, "user");
            assert_eq!(record.scope, "mcp:tools:read");
        }
    }

    #[tokio::test]
    async fn test_revoke_is_permanent_and_idempotent() {
        let store = RefreshTokenStore::new();
        let token = store.issue("client1", "user", "mcp", MONTH).await;

        assert!(store.revoke(&token).await.is_some());
        assert!(store.revoke(&token).await.is_some());
        assert!(store.lookup(&token).await.is_none());
        assert!(store.revoke("unknown").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_token_is_invalid() {
        let store = RefreshTokenStore::new();
        let token = store.issue("client1", "user", "mcp", Duration::ZERO).await;
        assert!(store.lookup(&token).await.is_none());

        assert_eq!(store.purge_expired().await, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_purge_keeps_revoked_until_expiry() {
        let store = RefreshTokenStore::new();
        let token = store.issue("client1", "user", "mcp", MONTH).await;
        store.revoke(&token).await;

        assert_eq!(store.purge_expired().await, 0);
        assert_eq!(store.len().await, 1);
        assert!(store.lookup(&token).await.is_none());
    }
}
