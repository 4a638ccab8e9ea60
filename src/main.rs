//! rssi-stream — live radio signal strength over Server-Sent Events.
//!
//! Run with:  `RUST_LOG=info rssi-stream`

use anyhow::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Structured logging — RUST_LOG controls verbosity (default: info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("rssi-stream v{} starting", env!("CARGO_PKG_VERSION"));

    rssi_server::run().await.map_err(Into::into)
}
