//! HTTP server for the authorization server and its protected MCP endpoint.

pub mod handlers;
pub mod mcp;
pub mod transport;

use std::sync::Arc;

use crate::oauth::AuthorizationServer;

/// HTTP front end over an [`AuthorizationServer`].
pub struct OAuthServer {
    auth: Arc<AuthorizationServer>,
}

impl OAuthServer {
    #[must_use]
    pub const fn new(auth: Arc<AuthorizationServer>) -> Self {
        Self { auth }
    }

    /// Run the server until CTRL+C.
    ///
    /// # Errors
    ///
    /// Returns error if the listener cannot bind or the server fails.
    pub async fn run_http(self) -> anyhow::Result<()> {
        let config = self.auth.config();
        let (host, port) = (config.host.clone(), config.port);

        tracing::info!(server_url = %config.server_url, "Starting OAuth server");

        Arc::clone(&self.auth).start_cleanup_task();
        let router = transport::create_router(self.auth);

        let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
        tracing::info!("HTTP server listening on http://{}", listener.local_addr()?);

        axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

        tracing::info!("HTTP server shut down");
        Ok(())
    }
}

impl std::fmt::Debug for OAuthServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthServer").finish()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
