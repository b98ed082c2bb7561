//! MCP OAuth Server
//!
//! An OAuth 2.0 authorization server core guarding an MCP resource endpoint.
//! Clients register dynamically, run the authorization code flow with PKCE,
//! and present short-lived HS256 access tokens to `/mcp`.
//!
//! # Features
//!
//! - **Discovery**: RFC 8414 and RFC 9728 metadata documents
//! - **Dynamic registration**: RFC 7591 public and confidential clients
//! - **Single-use codes**: atomic redemption under concurrent requests
//! - **Refresh and revocation**: reusable refresh tokens, RFC 7009 revocation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mcp_oauth_server::{AuthorizationServer, Config, server::OAuthServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let server = Arc::new(AuthorizationServer::new(config));
//!
//!     OAuthServer::new(server).run_http().await
//! }
//! ```

pub mod callback;
pub mod config;
pub mod error;
pub mod oauth;
pub mod server;

pub use config::Config;
pub use error::{OAuthError, OAuthResult};
pub use oauth::AuthorizationServer;
