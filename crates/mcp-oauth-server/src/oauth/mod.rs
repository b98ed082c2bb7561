//! OAuth 2.0 authorization server for MCP authentication.
//!
//! Issues short-lived signed access tokens to dynamically registered
//! clients through the authorization code grant with PKCE.
//!
//! ## Supported Standards
//! - RFC 9728: OAuth Protected Resource Metadata
//! - RFC 8414: OAuth Authorization Server Metadata
//! - RFC 7591: Dynamic Client Registration
//! - RFC 7636: PKCE (S256, optionally plain)
//! - RFC 6749: Authorization Code and Refresh Token Grants
//! - RFC 7009: Token Revocation

pub mod codes;
pub mod flow;
pub mod jwt;
pub mod messages;
pub mod metadata;
pub mod pkce;
pub mod refresh;
pub mod registry;
pub mod secrets;
pub mod types;

pub use codes::{AuthorizationCodeStore, CodeRequest, RedeemError};
pub use flow::AuthorizationServer;
pub use jwt::{MintedToken, TokenIssuer};
pub use messages::{
    AuthorizationRedirect, AuthorizeRequest, RegistrationRequest, RegistrationResponse,
    RevocationRequest, TokenRequest, TokenResponse,
};
pub use metadata::{AuthorizationServerMetadata, MetadataPublisher, ProtectedResourceMetadata};
pub use refresh::RefreshTokenStore;
pub use registry::{ClientRegistration, ClientRegistry};
pub use types::{AccessClaims, AuthorizationCode, GrantType, PkceMethod, RefreshToken, RegisteredClient};
