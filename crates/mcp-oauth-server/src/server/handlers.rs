//! OAuth 2.0 endpoint handlers.
//!
//! Thin glue: extract, call [`AuthorizationServer`](crate::oauth::AuthorizationServer),
//! render. Protocol errors render as `{error, error_description}`.

use std::sync::Arc;

use axum::{
    Form, Json,
    extract::{
        Query, State,
        rejection::{FormRejection, JsonRejection, QueryRejection},
    },
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use super::transport::HttpState;
use crate::error::OAuthError;
use crate::oauth::{
    AuthorizeRequest, RegistrationRequest, RegistrationResponse, RevocationRequest, TokenRequest,
    TokenResponse,
};

// ─── RFC 9728: Protected Resource Metadata ───────────────────────────────────

/// `GET /.well-known/oauth-protected-resource`
pub async fn handle_protected_resource(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(state.auth.metadata().protected_resource())
}

// ─── RFC 8414: Authorization Server Metadata ─────────────────────────────────

/// `GET /.well-known/oauth-authorization-server`
pub async fn handle_auth_server_metadata(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(state.auth.metadata().authorization_server())
}

// ─── RFC 7591: Dynamic Client Registration ───────────────────────────────────

/// `POST /oauth/register`
pub async fn handle_register(
    State(state): State<Arc<HttpState>>,
    payload: Result<Json<RegistrationRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            return OAuthError::invalid_request(rejection.body_text()).into_response();
        }
    };

    match state.auth.register(request).await {
        Ok(client) => (StatusCode::OK, Json(RegistrationResponse::from(client))).into_response(),
        Err(err) => err.into_response(),
    }
}

// ─── Authorization Endpoint ──────────────────────────────────────────────────

/// `GET /oauth/authorize`
///
/// Failures are answered directly with 400; the redirect URI is not
/// trusted until it has been matched against the registration.
pub async fn handle_authorize(
    State(state): State<Arc<HttpState>>,
    query: Result<Query<AuthorizeRequest>, QueryRejection>,
) -> Response {
    let Query(request) = match query {
        Ok(query) => query,
        Err(rejection) => {
            return OAuthError::invalid_request(rejection.body_text())
                .into_response_with_status(StatusCode::BAD_REQUEST);
        }
    };

    match state.auth.authorize(request).await {
        Ok(redirect) => (StatusCode::FOUND, [(header::LOCATION, redirect.location)]).into_response(),
        Err(err) => err.into_response_with_status(StatusCode::BAD_REQUEST),
    }
}

// ─── Token Endpoint ──────────────────────────────────────────────────────────

/// `POST /oauth/token`
///
/// Exchange authorization code for tokens, or refresh.
pub async fn handle_token(
    State(state): State<Arc<HttpState>>,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Response {
    let Form(request) = match form {
        Ok(form) => form,
        Err(rejection) => {
            return OAuthError::invalid_request(rejection.body_text()).into_response();
        }
    };

    match state.auth.exchange(request).await {
        Ok(tokens) => token_success(&tokens),
        Err(err) => err.into_response(),
    }
}

/// Build a token response with required OAuth 2.0 cache headers (RFC 6749 §5.1).
fn token_success(tokens: &TokenResponse) -> Response {
    let mut response = Json(tokens).into_response();

    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

// ─── RFC 7009: Token Revocation ──────────────────────────────────────────────

/// `POST /oauth/revoke`
pub async fn handle_revoke(
    State(state): State<Arc<HttpState>>,
    form: Result<Form<RevocationRequest>, FormRejection>,
) -> Response {
    let Form(request) = match form {
        Ok(form) => form,
        Err(rejection) => {
            return OAuthError::invalid_request(rejection.body_text()).into_response();
        }
    };

    match state.auth.revoke(request).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => err.into_response(),
    }
}
