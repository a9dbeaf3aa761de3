//! nsi-cli - operator console for the NSI backend
//!
//! Prints snapshots, the dashboard and search results as pretty JSON.
//! Logs go to stderr so stdout stays machine-readable.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{debug, info};

use nsi_cli::{execute, Cli};
use nsi_common::{Backend, HttpBackend};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting NSI console (nsi-cli) v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let config = cli.connection.client_config()?;
    debug!(base_url = %config.base_url, "Resolved client configuration");

    let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(config)?);
    let credentials = cli.connection.credentials();

    let output = execute(backend, credentials.as_ref(), &cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
