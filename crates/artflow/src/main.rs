use std::path::PathBuf;

use anyhow::Result;
use artflow::{load_config, spawn_event_printer, DEFAULT_CONFIG_PATH};
use artflow_net::ArtNetRuntime;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (stderr only, as stdout carries the event stream)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = load_config(&path)?;

    let runtime = ArtNetRuntime::start(config).await?;
    let _printer = spawn_event_printer(runtime.events());
    let _dmx_printer = spawn_event_printer(runtime.dmx_events());
    eprintln!("artflow monitor on {} (Ctrl-C to stop)", runtime.local_addr());

    tokio::signal::ctrl_c().await?;
    runtime.shutdown().await;

    Ok(())
}
