//! Discovery documents.
//!
//! - RFC 8414: OAuth Authorization Server Metadata
//! - RFC 9728: OAuth Protected Resource Metadata

use serde::Serialize;

use super::types::{GrantType, PkceMethod};
use crate::config::Config;

pub const AUTHORIZATION_SERVER_PATH: &str = "/.well-known/oauth-authorization-server";
pub const PROTECTED_RESOURCE_PATH: &str = "/.well-known/oauth-protected-resource";
pub const REGISTER_PATH: &str = "/oauth/register";
pub const AUTHORIZE_PATH: &str = "/oauth/authorize";
pub const TOKEN_PATH: &str = "/oauth/token";
pub const REVOKE_PATH: &str = "/oauth/revoke";

/// `GET /.well-known/oauth-authorization-server`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationServerMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub registration_endpoint: String,
    pub revocation_endpoint: String,
    pub response_types_supported: Vec<&'static str>,
    pub grant_types_supported: Vec<&'static str>,
    pub code_challenge_methods_supported: Vec<&'static str>,
    pub token_endpoint_auth_methods_supported: Vec<&'static str>,
    pub scopes_supported: Vec<String>,
}

/// `GET /.well-known/oauth-protected-resource`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtectedResourceMetadata {
    pub resource: String,
    pub authorization_servers: Vec<String>,
    pub scopes_supported: Vec<String>,
    pub bearer_methods_supported: Vec<&'static str>,
}

/// Derives both documents from static configuration.
#[derive(Debug, Clone)]
pub struct MetadataPublisher {
    server_url: String,
    scopes: Vec<String>,
    pkce_methods: Vec<PkceMethod>,
}

impl MetadataPublisher {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            server_url: config.server_url.clone(),
            scopes: config.scopes_supported.clone(),
            pkce_methods: config.pkce_methods.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.server_url)
    }

    #[must_use]
    pub fn authorization_server(&self) -> AuthorizationServerMetadata {
        AuthorizationServerMetadata {
            issuer: self.server_url.clone(),
            authorization_endpoint: self.endpoint(AUTHORIZE_PATH),
            token_endpoint: self.endpoint(TOKEN_PATH),
            registration_endpoint: self.endpoint(REGISTER_PATH),
            revocation_endpoint: self.endpoint(REVOKE_PATH),
            response_types_supported: vec!["code"],
            grant_types_supported: GrantType::ALL.iter().map(|g| g.as_str()).collect(),
            code_challenge_methods_supported: self.pkce_methods.iter().map(|m| m.as_str()).collect(),
            token_endpoint_auth_methods_supported: vec!["none", "client_secret_post"],
            scopes_supported: self.scopes.clone(),
        }
    }

    #[must_use]
    pub fn protected_resource(&self) -> ProtectedResourceMetadata {
        ProtectedResourceMetadata {
            resource: self.server_url.clone(),
            authorization_servers: vec![self.server_url.clone()],
            scopes_supported: self.scopes.clone(),
            bearer_methods_supported: vec!["header"],
        }
    }

    /// Discovery URL named in `WWW-Authenticate` challenges.
    #[must_use]
    pub fn protected_resource_url(&self) -> String {
        self.endpoint(PROTECTED_RESOURCE_PATH)
    }
}
