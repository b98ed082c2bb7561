//! Authorization flow orchestration.
//!
//! Composes the registry, the stores, PKCE and the token issuer into the
//! protocol operations behind the HTTP endpoints:
//!
//! ```text
//! Requested --(client, redirect, PKCE ok)--> CodeIssued
//! CodeIssued --(first valid redemption)----> Redeemed    (mints tokens)
//! CodeIssued --(binding or PKCE mismatch)--> CodeIssued
//! CodeIssued --(clock passes expiry)-------> Expired
//! Redeemed   --(any later redemption)------> AlreadyUsed
//! ```
//!
//! Client, redirect and verifier are checked under the same guard that marks
//! the code used, so only a fully valid request can consume it.
//!
//! Refresh is repeatable: `Valid -> Valid` on each call until revoked.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use super::codes::{AuthorizationCodeStore, CodeRequest, RedeemError};
use super::jwt::TokenIssuer;
use super::messages::{
    AuthorizationRedirect, AuthorizeRequest, RegistrationRequest, RevocationRequest, TokenRequest,
    TokenResponse, required,
};
use super::metadata::MetadataPublisher;
use super::pkce;
use super::refresh::RefreshTokenStore;
use super::registry::ClientRegistry;
use super::types::{AccessClaims, AuthorizationCode, GrantType, PkceMethod, RegisteredClient};
use crate::config::Config;
use crate::error::{OAuthError, OAuthResult};

/// The authorization server core shared by all request handlers.
#[derive(Debug, Clone)]
pub struct AuthorizationServer {
    config: Arc<Config>,
    registry: ClientRegistry,
    codes: AuthorizationCodeStore,
    refresh_tokens: RefreshTokenStore,
    issuer: TokenIssuer,
    metadata: MetadataPublisher,
}

impl AuthorizationServer {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let issuer = TokenIssuer::new(
            config.jwt_secret.as_bytes(),
            config.server_url.clone(),
            config.access_token_lifetime,
        );
        Self {
            registry: ClientRegistry::new(config.default_client_scope.clone()),
            codes: AuthorizationCodeStore::new(),
            refresh_tokens: RefreshTokenStore::new(),
            metadata: MetadataPublisher::new(&config),
            issuer,
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn codes(&self) -> &AuthorizationCodeStore {
        &self.codes
    }

    #[must_use]
    pub const fn refresh_tokens(&self) -> &RefreshTokenStore {
        &self.refresh_tokens
    }

    #[must_use]
    pub const fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    #[must_use]
    pub const fn metadata(&self) -> &MetadataPublisher {
        &self.metadata
    }

    // ─── Registration ────────────────────────────────────────────────────────

    /// Dynamic client registration.
    pub async fn register(&self, request: RegistrationRequest) -> OAuthResult<RegisteredClient> {
        self.registry.register(request.into_registration()?).await
    }

    // ─── Authorization ───────────────────────────────────────────────────────

    /// Validate an authorization request and issue a code.
    ///
    /// Consent is auto-approved for the configured subject.
    pub async fn authorize(&self, request: AuthorizeRequest) -> OAuthResult<AuthorizationRedirect> {
        let response_type = required(request.response_type.as_deref(), "response_type")?;
        let client_id = required(request.client_id.as_deref(), "client_id")?;
        let redirect_uri = required(request.redirect_uri.as_deref(), "redirect_uri")?;
        let code_challenge = required(request.code_challenge.as_deref(), "code_challenge")?;

        if response_type != "code" {
            return Err(OAuthError::invalid_request(
                "Unsupported response_type. Only 'code' is supported.",
            ));
        }

        let client = self
            .registry
            .lookup(client_id)
            .await
            .ok_or_else(|| OAuthError::invalid_client("Invalid client_id"))?;

        if !client.allows_redirect(redirect_uri) {
            tracing::warn!(client_id = %client_id, "Authorization with unregistered redirect_uri");
            return Err(OAuthError::invalid_request("Invalid redirect_uri"));
        }

        let method = match request.code_challenge_method.as_deref() {
            None | Some("") => PkceMethod::S256,
            Some(name) => name.parse::<PkceMethod>().map_err(|unknown| {
                OAuthError::invalid_request(format!("Unsupported code_challenge_method: {unknown}"))
            })?,
        };
        if !self.config.accepts_pkce_method(method) {
            return Err(OAuthError::invalid_request(format!(
                "Unsupported code_challenge_method: {method}"
            )));
        }
        if !pkce::is_valid_challenge(code_challenge, method) {
            return Err(OAuthError::invalid_request("Malformed code_challenge"));
        }

        let scope = request
            .scope
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| client.scope.clone());

        let code = self
            .codes
            .issue(
                CodeRequest {
                    client_id: client.client_id.clone(),
                    redirect_uri: redirect_uri.to_owned(),
                    code_challenge: code_challenge.to_owned(),
                    code_challenge_method: method,
                    subject: self.config.default_subject.clone(),
                    scope,
                },
                self.config.auth_code_lifetime,
            )
            .await;

        tracing::info!(client_id = %client.client_id, "Auto-approved authorization");

        let location = redirect_location(redirect_uri, &code, request.state.as_deref())?;
        Ok(AuthorizationRedirect { location, code })
    }

    // ─── Token ───────────────────────────────────────────────────────────────

    /// Token endpoint: exchange a code, or refresh.
    pub async fn exchange(&self, request: TokenRequest) -> OAuthResult<TokenResponse> {
        let grant_type = required(request.grant_type.as_deref(), "grant_type")?;
        match grant_type.parse::<GrantType>() {
            Ok(GrantType::AuthorizationCode) => self.exchange_code(&request).await,
            Ok(GrantType::RefreshToken) => self.exchange_refresh(&request).await,
            Err(unknown) => Err(OAuthError::unsupported_grant_type(unknown)),
        }
    }

    async fn exchange_code(&self, request: &TokenRequest) -> OAuthResult<TokenResponse> {
        let client_id = required(request.client_id.as_deref(), "client_id")?;
        let code = required(request.code.as_deref(), "code")?;
        let redirect_uri = required(request.redirect_uri.as_deref(), "redirect_uri")?;
        let code_verifier = required(request.code_verifier.as_deref(), "code_verifier")?;

        let client =
            self.registry.authenticate(client_id, request.client_secret.as_deref(), true).await?;
        if !client.allows_grant(GrantType::AuthorizationCode) {
            return Err(OAuthError::invalid_grant(
                "Client is not registered for the authorization_code grant",
            ));
        }

        let record = self
            .codes
            .redeem_atomic(code, |record| {
                check_code_binding(record, &client, redirect_uri, code_verifier)
            })
            .await
            .map_err(|err| {
                let err = match err {
                    RedeemError::NotFound => OAuthError::invalid_grant("Invalid authorization code"),
                    RedeemError::Expired => OAuthError::invalid_grant("Authorization code expired"),
                    RedeemError::AlreadyUsed => {
                        OAuthError::invalid_grant("Authorization code already used")
                    }
                    RedeemError::Rejected(err) => err,
                };
                tracing::warn!(client_id = %client_id, reason = %err, "Authorization code rejected");
                err
            })?;

        let minted = self.issuer.mint(&record.client_id, &record.subject, &record.scope)?;
        let refresh_token = if client.allows_grant(GrantType::RefreshToken) {
            Some(
                self.refresh_tokens
                    .issue(
                        &record.client_id,
                        &record.subject,
                        &record.scope,
                        self.config.refresh_token_lifetime,
                    )
                    .await,
            )
        } else {
            None
        };

        tracing::info!(client_id = %record.client_id, "Issued tokens for authorization code");

        Ok(TokenResponse {
            access_token: minted.access_token,
            token_type: "Bearer".to_string(),
            expires_in: minted.expires_in,
            refresh_token,
            scope: Some(record.scope),
        })
    }

    async fn exchange_refresh(&self, request: &TokenRequest) -> OAuthResult<TokenResponse> {
        let client_id = required(request.client_id.as_deref(), "client_id")?;
        let token = required(request.refresh_token.as_deref(), "refresh_token")?;

        let client =
            self.registry.authenticate(client_id, request.client_secret.as_deref(), false).await?;

        let record = self
            .refresh_tokens
            .lookup(token)
            .await
            .filter(|record| record.client_id == client.client_id)
            .ok_or_else(|| OAuthError::invalid_grant("Invalid or expired refresh token"))?;

        let minted = self.issuer.mint(&record.client_id, &record.subject, &record.scope)?;

        tracing::info!(client_id = %record.client_id, "Refreshed access token");

        Ok(TokenResponse {
            access_token: minted.access_token,
            token_type: "Bearer".to_string(),
            expires_in: minted.expires_in,
            refresh_token: Some(record.token),
            scope: Some(record.scope),
        })
    }

    // ─── Revocation ──────────────────────────────────────────────────────────

    /// Revoke a refresh token owned by the authenticated client.
    ///
    /// Unknown tokens succeed silently (RFC 7009 §2.2).
    pub async fn revoke(&self, request: RevocationRequest) -> OAuthResult<()> {
        let client_id = required(request.client_id.as_deref(), "client_id")?;
        let token = required(request.token.as_deref(), "token")?;
        if request.token_type_hint.as_deref() == Some("access_token") {
            // Access tokens are self-contained and cannot be revoked.
            return Ok(());
        }

        let client =
            self.registry.authenticate(client_id, request.client_secret.as_deref(), false).await?;

        match self.refresh_tokens.client_of(token).await {
            Some(owner) if owner == client.client_id => {
                self.refresh_tokens.revoke(token).await;
                tracing::info!(client_id = %client.client_id, "Revoked refresh token");
            }
            Some(_) => {
                tracing::warn!(client_id = %client.client_id, "Revocation of foreign refresh token");
            }
            None => {}
        }
        Ok(())
    }

    // ─── Resource access ─────────────────────────────────────────────────────

    /// Verify an `Authorization` header value of the form `Bearer <token>`.
    pub fn verify_bearer(&self, authorization: Option<&str>) -> OAuthResult<AccessClaims> {
        let token = authorization.and_then(parse_bearer).ok_or(OAuthError::InvalidToken)?;
        self.issuer.verify(token)
    }

    /// `WWW-Authenticate` challenge naming the discovery document.
    ///
    /// `presented` adds the RFC 6750 error attributes for a rejected credential.
    #[must_use]
    pub fn www_authenticate(&self, presented: bool) -> String {
        let mut challenge = format!(
            "Bearer realm=\"mcp-server\", resource_metadata=\"{}\"",
            self.metadata.protected_resource_url()
        );
        if presented {
            challenge.push_str(&format!(
                ", error=\"invalid_token\", error_description=\"{}\"",
                OAuthError::InvalidToken.description()
            ));
        }
        challenge
    }

    // ─── Cleanup ─────────────────────────────────────────────────────────────

    /// Remove expired codes and refresh tokens.
    pub async fn sweep_expired(&self) -> (usize, usize) {
        let codes = self.codes.purge_expired().await;
        let tokens = self.refresh_tokens.purge_expired().await;
        if codes > 0 || tokens > 0 {
            tracing::debug!(codes, refresh_tokens = tokens, "Cleaned up expired credentials");
        }
        (codes, tokens)
    }

    /// Start background cleanup task for expired codes and tokens.
    pub fn start_cleanup_task(self: Arc<Self>) {
        let period = self.config.cleanup_interval.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                self.sweep_expired().await;
            }
        });
    }
}

/// Bindings a code redemption must satisfy before the code is consumed.
///
/// A code held by another client is reported like an unknown one.
fn check_code_binding(
    record: &AuthorizationCode,
    client: &RegisteredClient,
    redirect_uri: &str,
    code_verifier: &str,
) -> OAuthResult<()> {
    if record.client_id != client.client_id {
        return Err(OAuthError::invalid_grant("Invalid authorization code"));
    }
    if record.redirect_uri != redirect_uri {
        return Err(OAuthError::invalid_grant("Redirect URI mismatch"));
    }
    if !pkce::is_valid_verifier(code_verifier)
        || !pkce::verify(code_verifier, &record.code_challenge, record.code_challenge_method)
    {
        return Err(OAuthError::invalid_grant("Invalid code_verifier"));
    }
    Ok(())
}

/// Extract the token from `Bearer <token>`. The scheme is case-insensitive.
fn parse_bearer(header: &str) -> Option<&str> {
    let mut parts = header.split_whitespace();
    let scheme = parts.next()?;
    let token = parts.next()?;
    if parts.next().is_some() || !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token)
}

/// Append `code` and `state` to the redirect URI, keeping any existing query.
fn redirect_location(redirect_uri: &str, code: &str, state: Option<&str>) -> OAuthResult<String> {
    let mut url = Url::parse(redirect_uri)
        .map_err(|_| OAuthError::invalid_request("Invalid redirect_uri"))?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("code", code);
        if let Some(state) = state {
            pairs.append_pair("state", state);
        }
    }
    Ok(url.into())
}
