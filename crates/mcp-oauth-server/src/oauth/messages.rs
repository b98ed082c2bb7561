//! Request and response bodies of the OAuth endpoints.

use serde::{Deserialize, Serialize};

use super::registry::ClientRegistration;
use super::types::RegisteredClient;
use crate::error::{OAuthError, OAuthResult};

/// `POST /oauth/register` body (RFC 7591 §2).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationRequest {
    pub redirect_uris: Option<Vec<String>>,
    pub client_name: Option<String>,
    pub client_uri: Option<String>,
    pub scope: Option<String>,
    pub grant_types: Option<Vec<String>>,
    pub response_types: Option<Vec<String>>,
    pub token_endpoint_auth_method: Option<String>,
}

impl RegistrationRequest {
    /// Validate the auth method and convert to registry input.
    pub fn into_registration(self) -> OAuthResult<ClientRegistration> {
        let public = match self.token_endpoint_auth_method.as_deref() {
            None | Some("client_secret_post") => false,
            Some("none") => true,
            Some(other) => {
                return Err(OAuthError::invalid_request(format!(
                    "Unsupported token_endpoint_auth_method: {other}"
                )));
            }
        };

        Ok(ClientRegistration {
            redirect_uris: self.redirect_uris.unwrap_or_default(),
            client_name: self.client_name,
            client_uri: self.client_uri,
            scope: self.scope,
            grant_types: self.grant_types,
            response_types: self.response_types,
            public,
        })
    }
}

/// Registration response (RFC 7591 §3.2.1).
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationResponse {
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub client_id_issued_at: i64,
    pub client_secret_expires_at: i64,
    pub redirect_uris: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_uri: Option<String>,
    pub scope: String,
    pub grant_types: Vec<&'static str>,
    pub response_types: Vec<String>,
    pub token_endpoint_auth_method: &'static str,
}

impl From<RegisteredClient> for RegistrationResponse {
    fn from(client: RegisteredClient) -> Self {
        Self {
            token_endpoint_auth_method: client.token_endpoint_auth_method(),
            grant_types: client.grant_types.iter().map(|g| g.as_str()).collect(),
            client_id_issued_at: client.created_at.timestamp(),
            // Secrets never expire
            client_secret_expires_at: 0,
            client_id: client.client_id,
            client_secret: client.client_secret,
            redirect_uris: client.redirect_uris,
            client_name: client.client_name,
            client_uri: client.client_uri,
            scope: client.scope,
            response_types: client.response_types,
        }
    }
}

/// `GET /oauth/authorize` query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizeRequest {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
}

/// Outcome of an approved authorization request.
#[derive(Debug, Clone)]
pub struct AuthorizationRedirect {
    /// `redirect_uri` with `code` and `state` appended.
    pub location: String,
    pub code: String,
}

/// `POST /oauth/token` form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Successful token response (RFC 6749 §5.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// `POST /oauth/revoke` form (RFC 7009 §2.1).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RevocationRequest {
    pub token: Option<String>,
    pub token_type_hint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Fetch a required, non-empty parameter.
pub(crate) fn required<'a>(value: Option<&'a str>, name: &str) -> OAuthResult<&'a str> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| OAuthError::invalid_request(format!("{name} is required")))
}
