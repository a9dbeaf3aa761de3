//! nsi-proxy - edge reverse proxy for the NSI console
//!
//! Forwards `/api/*` and `/auth/*` to the NSI backend and rewrites session
//! cookies for the serving host.

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use tracing::{error, info};

use nsi_proxy::{build_router, AppState};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "nsi-proxy")]
#[command(about = "Edge reverse proxy for the NSI console")]
#[command(version)]
struct Args {
    /// Backend origin requests are forwarded to, e.g. https://nsi.example/api
    #[arg(long, env = "BACKEND_BASE")]
    backend_base: Option<String>,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:5730", env = "NSI_PROXY_BIND")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting NSI edge proxy (nsi-proxy) v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let state = match AppState::new(args.backend_base) {
        Ok(state) => state,
        Err(e) => {
            error!("Invalid proxy configuration: {}", e);
            return Err(e.into());
        }
    };
    if let Some(base) = &state.backend_base {
        info!("Forwarding /api and /auth to {}", base);
    }
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    info!("nsi-proxy listening on http://{}", args.bind);
    info!("Health check: http://{}/health", args.bind);

    axum::serve(listener, app).await?;

    Ok(())
}
