//! Dynamic Client Registration (RFC 7591) and client authentication.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use url::Url;

use super::secrets::{constant_time_eq, generate_client_id, generate_token};
use super::types::{GrantType, RegisteredClient};
use crate::error::{OAuthError, OAuthResult};

/// Client metadata submitted at registration.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistration {
    pub redirect_uris: Vec<String>,
    pub client_name: Option<String>,
    pub client_uri: Option<String>,
    pub scope: Option<String>,
    pub grant_types: Option<Vec<String>>,
    pub response_types: Option<Vec<String>>,
    /// Register without a secret (`token_endpoint_auth_method=none`).
    pub public: bool,
}

impl ClientRegistration {
    /// Registration with only redirect URIs; every other field defaults.
    #[must_use]
    pub fn new(redirect_uris: Vec<String>) -> Self {
        Self { redirect_uris, ..Self::default() }
    }
}

/// Registered clients, keyed by client id. Lives for the process lifetime.
#[derive(Clone)]
pub struct ClientRegistry {
    clients: Arc<RwLock<HashMap<String, RegisteredClient>>>,
    default_scope: String,
}

impl ClientRegistry {
    #[must_use]
    pub fn new(default_scope: impl Into<String>) -> Self {
        Self { clients: Arc::new(RwLock::new(HashMap::new())), default_scope: default_scope.into() }
    }

    /// Register a new client.
    ///
    /// The returned record is the only place the raw secret is ever handed out.
    pub async fn register(&self, request: ClientRegistration) -> OAuthResult<RegisteredClient> {
        if request.redirect_uris.is_empty() {
            return Err(OAuthError::invalid_request(
                "redirect_uris is required and must not be empty",
            ));
        }
        for uri in &request.redirect_uris {
            validate_redirect_uri(uri)?;
        }

        let grant_types = match request.grant_types {
            Some(types) if !types.is_empty() => types
                .iter()
                .map(|t| {
                    t.parse::<GrantType>().map_err(|unknown| {
                        OAuthError::invalid_request(format!("Unsupported grant_type: {unknown}"))
                    })
                })
                .collect::<OAuthResult<Vec<_>>>()?,
            _ => GrantType::ALL.to_vec(),
        };

        let response_types = match request.response_types {
            Some(types) if !types.is_empty() => {
                if let Some(bad) = types.iter().find(|t| t.as_str() != "code") {
                    return Err(OAuthError::invalid_request(format!(
                        "Unsupported response_type: {bad}"
                    )));
                }
                types
            }
            _ => vec!["code".to_string()],
        };

        let client = RegisteredClient {
            client_id: generate_client_id(),
            client_secret: (!request.public).then(generate_token),
            redirect_uris: request.redirect_uris,
            client_name: request.client_name,
            client_uri: request.client_uri,
            scope: request
                .scope
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| self.default_scope.clone()),
            grant_types,
            response_types,
            created_at: Utc::now(),
        };

        self.clients.write().await.insert(client.client_id.clone(), client.clone());

        tracing::info!(
            client_id = %client.client_id,
            confidential = client.is_confidential(),
            "Registered OAuth client"
        );

        Ok(client)
    }

    /// Look up a client by ID.
    pub async fn lookup(&self, client_id: &str) -> Option<RegisteredClient> {
        self.clients.read().await.get(client_id).cloned()
    }

    /// Authenticate a client at the token or revocation endpoint.
    ///
    /// A presented secret must match in constant time. A confidential client
    /// may omit its secret only when the grant carries a PKCE proof.
    pub async fn authenticate(
        &self,
        client_id: &str,
        provided_secret: Option<&str>,
        has_pkce_proof: bool,
    ) -> OAuthResult<RegisteredClient> {
        let Some(client) = self.lookup(client_id).await else {
            tracing::warn!(client_id = %client_id, "Authentication attempt for unknown client");
            return Err(OAuthError::invalid_client("Invalid client credentials"));
        };

        match (client.client_secret.as_deref(), provided_secret) {
            (Some(stored), Some(provided)) => {
                if !constant_time_eq(stored, provided) {
                    tracing::warn!(client_id = %client_id, "Client secret mismatch");
                    return Err(OAuthError::invalid_client("Invalid client credentials"));
                }
            }
            (Some(_), None) => {
                if !has_pkce_proof {
                    tracing::warn!(client_id = %client_id, "Missing client secret without PKCE");
                    return Err(OAuthError::invalid_client("Client authentication required"));
                }
            }
            (None, Some(_)) => {
                return Err(OAuthError::invalid_client("Public client must not send a secret"));
            }
            (None, None) => {}
        }

        Ok(client)
    }

    /// Number of registered clients.
    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry").finish()
    }
}

/// Redirect URIs must be absolute and carry no fragment (RFC 6749 §3.1.2).
fn validate_redirect_uri(uri: &str) -> OAuthResult<()> {
    let parsed = Url::parse(uri)
        .map_err(|_| OAuthError::invalid_request(format!("Invalid redirect_uri: {uri}")))?;
    if parsed.fragment().is_some() {
        return Err(OAuthError::invalid_request("redirect_uri must not contain a fragment"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ClientRegistry {
        ClientRegistry::new("mcp:tools:read")
    }

    #[tokio::test]
    async fn test_register_rejects_empty_redirects() {
        let err = registry().register(ClientRegistration::new(vec![])).await.unwrap_err();
        assert_eq!(err.error_code(), "invalid_request");
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = registry();
        let client = registry
            .register(ClientRegistration {
                client_name: Some("Test App".into()),
                ..ClientRegistration::new(vec!["https://a/cb".into()])
            })
            .await
            .unwrap();

        assert!(client.client_id.starts_with("client_"));
        assert!(client.client_secret.is_some());
        assert_eq!(client.scope, "mcp:tools:read");
        assert_eq!(client.grant_types, GrantType::ALL.to_vec());
        assert_eq!(client.response_types, vec!["code".to_string()]);

        let found = registry.lookup(&client.client_id).await.unwrap();
        assert_eq!(found.client_name.as_deref(), Some("Test App"));
        assert!(registry.lookup("client_unknown").await.is_none());
    }

    #[tokio::test]
    async fn test_public_client_has_no_secret() {
        let client = registry()
            .register(ClientRegistration {
                public: true,
                ..ClientRegistration::new(vec!["http://localhost:3000/callback".into()])
            })
            .await
            .unwrap();
        assert!(client.client_secret.is_none());
        assert_eq!(client.token_endpoint_auth_method(), "none");
    }

    #[tokio::test]
    async fn test_register_rejects_bad_metadata() {
        let registry = registry();
        for request in [
            ClientRegistration::new(vec!["not a url".into()]),
            ClientRegistration::new(vec!["https://a/cb#frag".into()]),
            ClientRegistration {
                grant_types: Some(vec!["password".into()]),
                ..ClientRegistration::new(vec!["https://a/cb".into()])
            },
            ClientRegistration {
                response_types: Some(vec!["token".into()]),
                ..ClientRegistration::new(vec!["https://a/cb".into()])
            },
        ] {
            let err = registry.register(request).await.unwrap_err();
            assert_eq!(err.error_code(), "invalid_request");
        }
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_authenticate_confidential() {
        let registry = registry();
        let client =
            registry.register(ClientRegistration::new(vec!["https://a/cb".into()])).await.unwrap();
        let secret = client.client_secret.clone().unwrap();

        assert!(registry.authenticate(&client.client_id, Some(&secret), false).await.is_ok());
        assert!(registry.authenticate(&client.client_id, None, true).await.is_ok());

        let err = registry.authenticate(&client.client_id, Some("wrong"), true).await.unwrap_err();
        assert_eq!(err, OAuthError::invalid_client("Invalid client credentials"));

        let err = registry.authenticate(&client.client_id, None, false).await.unwrap_err();
        assert_eq!(err.error_code(), "invalid_client");
    }

    #[tokio::test]
    async fn test_authenticate_unknown_and_public() {
        let registry = registry();
        let err = registry.authenticate("client_nope", None, true).await.unwrap_err();
        assert_eq!(err.error_code(), "invalid_client");

        let client = registry
            .register(ClientRegistration {
                public: true,
                ..ClientRegistration::new(vec!["https://a/cb".into()])
            })
            .await
            .unwrap();
        assert!(registry.authenticate(&client.client_id, None, true).await.is_ok());
        assert!(registry.authenticate(&client.client_id, Some("x"), true).await.is_err());
    }
}
