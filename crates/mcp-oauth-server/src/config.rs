//! Configuration for the MCP OAuth server.

use std::time::Duration;

use anyhow::Context;

use crate::oauth::PkceMethod;

/// OAuth configuration constants.
pub mod defaults {
    use std::time::Duration;

    /// Canonical server URL, used as issuer and audience.
    pub const SERVER_URL: &str = "http://localhost:8000";

    /// Bind address.
    pub const SERVER_HOST: &str = "0.0.0.0";

    /// Bind port.
    pub const SERVER_PORT: u16 = 8000;

    /// Development signing secret. Never use in production.
    pub const JWT_SECRET_KEY: &str = "dev-secret-key-change-in-production";

    /// Access token lifetime: 1 hour.
    pub const ACCESS_TOKEN_LIFETIME: Duration = Duration::from_secs(60 * 60);

    /// Authorization code lifetime: 10 minutes.
    pub const AUTH_CODE_LIFETIME: Duration = Duration::from_secs(10 * 60);

    /// Refresh token lifetime: 30 days.
    pub const REFRESH_TOKEN_LIFETIME: Duration = Duration::from_secs(30 * 24 * 60 * 60);

    /// Cleanup interval: 5 minutes.
    pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

    /// Scopes advertised in discovery documents.
    pub const SCOPES_SUPPORTED: &[&str] = &["mcp:tools:read", "mcp:tools:execute"];

    /// Scope granted to clients that register without one.
    pub const CLIENT_SCOPE: &str = "mcp:tools:read mcp:tools:execute";

    /// Subject bound to auto-approved consent.
    pub const SUBJECT: &str = "mock_user_123";

    /// Name announced by the MCP `initialize` handshake.
    pub const MCP_SERVER_NAME: &str = "Mock MCP Server";
}

/// Server configuration.
#[derive(Clone)]
pub struct Config {
    /// Canonical server URL (no trailing slash).
    pub server_url: String,

    /// Bind host.
    pub host: String,

    /// Bind port.
    pub port: u16,

    /// Symmetric key for HS256 access tokens.
    pub jwt_secret: String,

    /// Access token lifetime.
    pub access_token_lifetime: Duration,

    /// Authorization code lifetime.
    pub auth_code_lifetime: Duration,

    /// Refresh token lifetime.
    pub refresh_token_lifetime: Duration,

    /// Interval between background sweeps of expired codes and tokens.
    pub cleanup_interval: Duration,

    /// Scopes advertised in discovery documents.
    pub scopes_supported: Vec<String>,

    /// Scope for clients that register without one.
    pub default_client_scope: String,

    /// Subject bound to auto-approved consent.
    pub default_subject: String,

    /// Accepted PKCE challenge methods.
    pub pkce_methods: Vec<PkceMethod>,

    /// MCP server name.
    pub mcp_server_name: String,

    /// MCP server version.
    pub mcp_server_version: String,
}

impl Config {
    /// Create a configuration for the given canonical URL with default lifetimes.
    #[must_use]
    pub fn new(server_url: impl Into<String>, jwt_secret: impl Into<String>) -> Self {
        Self {
            server_url: normalize_url(server_url.into()),
            host: defaults::SERVER_HOST.to_string(),
            port: defaults::SERVER_PORT,
            jwt_secret: jwt_secret.into(),
            access_token_lifetime: defaults::ACCESS_TOKEN_LIFETIME,
            auth_code_lifetime: defaults::AUTH_CODE_LIFETIME,
            refresh_token_lifetime: defaults::REFRESH_TOKEN_LIFETIME,
            cleanup_interval: defaults::CLEANUP_INTERVAL,
            scopes_supported: defaults::SCOPES_SUPPORTED.iter().map(ToString::to_string).collect(),
            default_client_scope: defaults::CLIENT_SCOPE.to_string(),
            default_subject: defaults::SUBJECT.to_string(),
            pkce_methods: vec![PkceMethod::S256],
            mcp_server_name: defaults::MCP_SERVER_NAME.to_string(),
            mcp_server_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Create a test configuration with a fixed secret.
    #[must_use]
    pub fn for_testing(server_url: &str) -> Self {
        Self::new(server_url, "test-signing-secret-0123456789abcdef")
    }

    /// Create configuration from environment variables (and an optional `.env`).
    ///
    /// # Errors
    ///
    /// Returns error if a numeric variable cannot be parsed.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let server_url =
            std::env::var("SERVER_URL").unwrap_or_else(|_| defaults::SERVER_URL.to_string());
        let jwt_secret =
            std::env::var("JWT_SECRET_KEY").unwrap_or_else(|_| defaults::JWT_SECRET_KEY.to_string());

        let mut config = Self::new(server_url, jwt_secret);

        if let Ok(host) = std::env::var("SERVER_HOST") {
            config.host = host;
        }
        if let Some(port) = env_number::<u16>("SERVER_PORT")? {
            config.port = port;
        }
        if let Some(minutes) = env_number::<u64>("JWT_ACCESS_TOKEN_EXPIRE_MINUTES")? {
            config.access_token_lifetime = Duration::from_secs(minutes * 60);
        }
        if let Some(minutes) = env_number::<u64>("OAUTH_AUTHORIZATION_CODE_EXPIRE_MINUTES")? {
            config.auth_code_lifetime = Duration::from_secs(minutes * 60);
        }
        if let Some(days) = env_number::<u64>("OAUTH_REFRESH_TOKEN_EXPIRE_DAYS")? {
            config.refresh_token_lifetime = Duration::from_secs(days * 24 * 60 * 60);
        }
        if let Ok(name) = std::env::var("MCP_SERVER_NAME") {
            config.mcp_server_name = name;
        }
        if let Ok(version) = std::env::var("MCP_SERVER_VERSION") {
            config.mcp_server_version = version;
        }

        Ok(config)
    }

    /// Replace the canonical server URL.
    #[must_use]
    pub fn with_server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = normalize_url(server_url.into());
        self
    }

    /// Check if the built-in development secret is in use.
    #[must_use]
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == defaults::JWT_SECRET_KEY
    }

    /// Check if a PKCE method is accepted at the authorization endpoint.
    #[must_use]
    pub fn accepts_pkce_method(&self, method: PkceMethod) -> bool {
        self.pkce_methods.contains(&method)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server_url", &self.server_url)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("jwt_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(defaults::SERVER_URL, defaults::JWT_SECRET_KEY)
    }
}

fn normalize_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

fn env_number<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => {
            let value = raw.trim().parse::<T>().with_context(|| format!("invalid {name}: {raw:?}"))?;
            Ok(Some(value))
        }
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server_url, "http://localhost:8000");
        assert!(config.uses_dev_secret());
        assert_eq!(config.access_token_lifetime, Duration::from_secs(3600));
        assert_eq!(config.auth_code_lifetime, Duration::from_secs(600));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = Config::for_testing("https://auth.example.com/");
        assert_eq!(config.server_url, "https://auth.example.com");
        assert!(!config.uses_dev_secret());
    }

    #[test]
    fn test_only_s256_by_default() {
        let config = Config::default();
        assert!(config.accepts_pkce_method(PkceMethod::S256));
        assert!(!config.accepts_pkce_method(PkceMethod::Plain));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", Config::for_testing("https://example.com"));
        assert!(!debug.contains("test-signing-secret"));
    }

    #[test]
    fn test_with_server_url() {
        let config = Config::default().with_server_url("https://mcp.example.org//");
        assert_eq!(config.server_url, "https://mcp.example.org");
    }
}
