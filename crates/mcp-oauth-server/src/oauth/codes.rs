//! One-time authorization codes.
//!
//! Redemption checks expiry, the used flag and the caller's bindings, then
//! sets the flag, all under a single write guard. Among any number of
//! concurrent redemptions of the same code exactly one succeeds, and a
//! redemption that fails its bindings leaves the code usable. The cleanup
//! sweep takes the same guard and can never observe a record mid-redemption.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;

use super::secrets::generate_token;
use super::types::{AuthorizationCode, PkceMethod, expires_after};

/// Everything bound to a code at issuance.
#[derive(Debug, Clone)]
pub struct CodeRequest {
    pub client_id: String,
    pub redirect_uri: String,
    pub code_challenge: String,
    pub code_challenge_method: PkceMethod,
    pub subject: String,
    pub scope: String,
}

/// Why a redemption failed.
///
/// `Rejected` carries the caller's own check failure; the code stays unused.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeemError<E = Infallible> {
    #[error("authorization code not found")]
    NotFound,
    #[error("authorization code expired")]
    Expired,
    #[error("authorization code already used")]
    AlreadyUsed,
    #[error("authorization code rejected")]
    Rejected(E),
}

/// In-memory authorization code store.
#[derive(Clone, Default)]
pub struct AuthorizationCodeStore {
    codes: Arc<RwLock<HashMap<String, AuthorizationCode>>>,
}

impl AuthorizationCodeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh, unused code valid for `ttl`.
    pub async fn issue(&self, request: CodeRequest, ttl: Duration) -> String {
        let code = generate_token();
        let record = AuthorizationCode {
            code: code.clone(),
            client_id: request.client_id,
            redirect_uri: request.redirect_uri,
            scope: request.scope,
            code_challenge: request.code_challenge,
            code_challenge_method: request.code_challenge_method,
            subject: request.subject,
            expires_at: expires_after(Utc::now(), ttl),
            used: false,
        };

        self.codes.write().await.insert(code.clone(), record);
        code
    }

    /// Atomically consume a code if `check` accepts the stored record.
    ///
    /// `check` runs under the write guard and must not block. When it fails
    /// the used flag is left untouched. Expired codes are dropped on this
    /// read, so a later attempt reports `NotFound`.
    pub async fn redeem_atomic<E, F>(
        &self,
        code: &str,
        check: F,
    ) -> Result<AuthorizationCode, RedeemError<E>>
    where
        F: FnOnce(&AuthorizationCode) -> Result<(), E>,
    {
        let mut codes = self.codes.write().await;
        let now = Utc::now();

        let expired = match codes.get(code) {
            Some(record) => record.is_expired_at(now),
            None => return Err(RedeemError::NotFound),
        };
        if expired {
            codes.remove(code);
            return Err(RedeemError::Expired);
        }

        let record = codes.get_mut(code).ok_or(RedeemError::NotFound)?;
        if record.used {
            return Err(RedeemError::AlreadyUsed);
        }
        check(record).map_err(RedeemError::Rejected)?;
        record.used = true;
        Ok(record.clone())
    }

    /// Drop every expired code. Used codes are kept until expiry so that a
    /// replay reports `AlreadyUsed` rather than `NotFound`.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut codes = self.codes.write().await;
        let before = codes.len();
        codes.retain(|_, record| !record.is_expired_at(now));
        before - codes.len()
    }

    /// Number of codes currently held.
    pub async fn len(&self) -> usize {
        self.codes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.codes.read().await.is_empty()
    }
}

impl std::fmt::Debug for AuthorizationCodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationCodeStore").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accept(_: &AuthorizationCode) -> Result<(), Infallible> {
        Ok(())
    }

    fn request() -> CodeRequest {
        CodeRequest {
            client_id: "client1".into(),
            redirect_uri: "http://localhost/callback".into(),
            code_challenge: "challenge".into(),
            code_challenge_method: PkceMethod::S256,
            subject: "user".into(),
            scope: "mcp:tools:read".into(),
        }
    }

    #[tokio::test]
    async fn test_auth_code_lifecycle() {
        let store = AuthorizationCodeStore::new();
        let code = store.issue(request(), Duration::from_secs(600)).await;

        // First redemption succeeds
        let record = store.redeem_atomic(&code, accept).await.unwrap();
        assert_eq!(record.client_id, "client1");
        assert_eq!(record.subject, "user");
        assert!(record.used);

        // Second redemption fails
        assert_eq!(store.redeem_atomic(&code, accept).await.unwrap_err(), RedeemError::AlreadyUsed);
    }

    #[tokio::test]
    async fn test_unknown_code() {
        let store = AuthorizationCodeStore::new();
        assert_eq!(store.redeem_atomic("nope", accept).await.unwrap_err(), RedeemError::NotFound);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_expired() {
        let store = AuthorizationCodeStore::new();
        let code = store.issue(request(), Duration::ZERO).await;

        assert_eq!(store.redeem_atomic(&code, accept).await.unwrap_err(), RedeemError::Expired);
        // Dropped on read
        assert_eq!(store.redeem_atomic(&code, accept).await.unwrap_err(), RedeemError::NotFound);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_purge_keeps_live_codes() {
        let store = AuthorizationCodeStore::new();
        let live = store.issue(request(), Duration::from_secs(600)).await;
        store.issue(request(), Duration::ZERO).await;
        store.issue(request(), Duration::ZERO).await;

        assert_eq!(store.purge_expired().await, 2);
        assert_eq!(store.len().await, 1);
        assert!(store.redeem_atomic(&live, accept).await.is_ok());
    }

    #[tokio::test]
    async fn test_rejected_check_leaves_code_unused() {
        let store = AuthorizationCodeStore::new();
        let code = store.issue(request(), Duration::from_secs(600)).await;

        let err = store
            .redeem_atomic(&code, |record| {
                if record.redirect_uri == "http://evil/cb" { Ok(()) } else { Err("redirect mismatch") }
            })
            .await
            .unwrap_err();
        assert_eq!(err, RedeemError::Rejected("redirect mismatch"));

        // The rightful redemption still succeeds, exactly once
        assert!(store.redeem_atomic(&code, accept).await.is_ok());
        assert_eq!(store.redeem_atomic(&code, accept).await.unwrap_err(), RedeemError::AlreadyUsed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_redemption_single_winner() {
        let store = AuthorizationCodeStore::new();
        let code = store.issue(request(), Duration::from_secs(600)).await;

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                let code = code.clone();
                tokio::spawn(async move { store.redeem_atomic(&code, accept).await })
            })
            .collect();

        let mut wins = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(err) => assert_eq!(err, RedeemError::AlreadyUsed),
            }
        }
        assert_eq!(wins, 1, "broken atomicity: {wins} redemptions succeeded");
    }
}
