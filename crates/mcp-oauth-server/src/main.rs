//! MCP OAuth Server - Entry Point

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use mcp_oauth_server::{AuthorizationServer, config::Config, server::OAuthServer};

#[derive(Parser, Debug)]
#[command(name = "mcp-oauth-server")]
#[command(about = "OAuth 2.0 authorization server guarding an MCP endpoint")]
#[command(version)]
struct Cli {
    /// Bind host (overrides SERVER_HOST)
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,

    /// Bind port (overrides SERVER_PORT)
    #[arg(long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Canonical public URL, used as issuer and audience (overrides SERVER_URL)
    #[arg(long, env = "SERVER_URL")]
    server_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    let mut config = Config::from_env()?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(server_url) = cli.server_url {
        config = config.with_server_url(server_url);
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        server_url = %config.server_url,
        "Starting MCP OAuth server"
    );
    if config.uses_dev_secret() {
        tracing::warn!("JWT_SECRET_KEY is not set; using the built-in development secret");
    }

    let auth = Arc::new(AuthorizationServer::new(config));
    OAuthServer::new(auth).run_http().await
}
