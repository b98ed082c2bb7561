//! Error types for the OAuth authorization server.
//!
//! Uses `thiserror` for structured error handling. Every variant maps to a
//! standard OAuth 2.0 error code (RFC 6749 §5.2, RFC 6750 §3.1) and renders
//! as `{error, error_description}` without internal detail.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Protocol errors surfaced to OAuth clients.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OAuthError {
    /// Malformed or missing required parameter.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown client or failed client authentication.
    #[error("invalid client: {0}")]
    InvalidClient(String),

    /// Bad, expired or reused authorization code, failed PKCE proof,
    /// bad refresh token, or redirect URI mismatch.
    #[error("invalid grant: {0}")]
    InvalidGrant(String),

    /// The grant type is not supported by this server.
    #[error("unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    /// Access token verification failed.
    ///
    /// Carries no detail so that a bad signature, expiry and a wrong
    /// audience are indistinguishable to the caller.
    #[error("invalid token")]
    InvalidToken,

    /// A valid access token that lacks the scope a call needs.
    #[error("insufficient scope: {0}")]
    InsufficientScope(String),

    /// The server could not sign a token.
    #[error("server error")]
    ServerError,
}

/// Wire shape of an OAuth error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub error_description: String,
}

impl OAuthError {
    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create an invalid client error.
    #[must_use]
    pub fn invalid_client(message: impl Into<String>) -> Self {
        Self::InvalidClient(message.into())
    }

    /// Create an invalid grant error.
    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant(message.into())
    }

    /// Create an unsupported grant type error.
    #[must_use]
    pub fn unsupported_grant_type(grant_type: impl Into<String>) -> Self {
        Self::UnsupportedGrantType(grant_type.into())
    }

    /// The OAuth 2.0 `error` code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidClient(_) => "invalid_client",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::InvalidToken => "invalid_token",
            Self::InsufficientScope(_) => "insufficient_scope",
            Self::ServerError => "server_error",
        }
    }

    /// Human-readable `error_description`.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::InvalidRequest(msg) | Self::InvalidClient(msg) | Self::InvalidGrant(msg) => {
                msg.clone()
            }
            Self::UnsupportedGrantType(grant_type) => {
                format!("Unsupported grant_type: {grant_type}")
            }
            Self::InvalidToken => "The access token is invalid or expired".to_string(),
            Self::InsufficientScope(scope) => format!("The request requires the {scope} scope"),
            Self::ServerError => "An internal error occurred".to_string(),
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidClient(_) | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::InsufficientScope(_) => StatusCode::FORBIDDEN,
            Self::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Error body as sent on the wire.
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        ErrorBody { error: self.error_code(), error_description: self.description() }
    }

    /// Render with an explicit status, e.g. 400 for every authorize failure.
    #[must_use]
    pub fn into_response_with_status(self, status: StatusCode) -> Response {
        let mut response = (status, Json(self.body())).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        match &self {
            Self::InvalidToken => {
                headers.insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static("Bearer error=\"invalid_token\""),
                );
            }
            Self::InsufficientScope(scope) => {
                let challenge = format!("Bearer error=\"insufficient_scope\", scope=\"{scope}\"");
                if let Ok(value) = HeaderValue::from_str(&challenge) {
                    headers.insert(header::WWW_AUTHENTICATE, value);
                }
            }
            _ => {}
        }
        response
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        self.into_response_with_status(status)
    }
}

/// Result type alias for OAuth operations.
pub type OAuthResult<T> = Result<T, OAuthError>;
