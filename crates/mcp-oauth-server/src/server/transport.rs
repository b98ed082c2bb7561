//! HTTP routing.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::{handlers, mcp};
use crate::oauth::AuthorizationServer;
use crate::oauth::metadata::{
    AUTHORIZATION_SERVER_PATH, AUTHORIZE_PATH, PROTECTED_RESOURCE_PATH, REGISTER_PATH, REVOKE_PATH,
    TOKEN_PATH,
};

/// Shared state for HTTP handlers.
pub struct HttpState {
    pub auth: Arc<AuthorizationServer>,
}

impl std::fmt::Debug for HttpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpState").finish()
    }
}

/// Create the HTTP router.
///
/// The cleanup task is not started here; see
/// [`AuthorizationServer::start_cleanup_task`].
pub fn create_router(auth: Arc<AuthorizationServer>) -> Router {
    let state = Arc::new(HttpState { auth });

    Router::new()
        .route("/", get(server_info))
        .route("/health", get(health_check))
        .route(PROTECTED_RESOURCE_PATH, get(handlers::handle_protected_resource))
        .route(AUTHORIZATION_SERVER_PATH, get(handlers::handle_auth_server_metadata))
        .route(REGISTER_PATH, post(handlers::handle_register))
        .route(AUTHORIZE_PATH, get(handlers::handle_authorize))
        .route(TOKEN_PATH, post(handlers::handle_token))
        .route(REVOKE_PATH, post(handlers::handle_revoke))
        .route("/mcp", post(mcp::handle_mcp_post))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn server_info(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let config = state.auth.config();
    let url = &config.server_url;
    Json(serde_json::json!({
        "name": config.mcp_server_name,
        "version": config.mcp_server_version,
        "endpoints": {
            "mcp": format!("{url}/mcp"),
            "authorization_server_metadata": format!("{url}{AUTHORIZATION_SERVER_PATH}"),
            "protected_resource_metadata": format!("{url}{PROTECTED_RESOURCE_PATH}"),
            "register": format!("{url}{REGISTER_PATH}"),
            "authorize": format!("{url}{AUTHORIZE_PATH}"),
            "token": format!("{url}{TOKEN_PATH}"),
            "revoke": format!("{url}{REVOKE_PATH}")
        }
    }))
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "mcp-oauth-server",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
