//! jobcastd - Jobcast daemon.
//!
//! Hosts the job status hub: job workers and observers connect over TCP
//! and exchange line-delimited JSON, while the similarity sweep and the
//! optional demo reset run in the background.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use jobcast::server::config::Config;

/// Jobcast daemon - job status hub.
#[derive(Parser)]
#[command(name = "jobcastd")]
#[command(version = jobcast::PKG_VERSION)]
#[command(about = "Jobcast job status daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Force demo mode (daily wipe and reseed) on or off.
    ///
    /// The daemon resets its own in-memory storage, which only ever holds
    /// the seeded baseline; embed the library with a real `StorageBackend`
    /// to reset shared job data.
    #[arg(long, env = "JOBCAST_DEMO_MODE")]
    demo_mode: Option<bool>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Load configuration
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(demo_mode) = args.demo_mode {
        config.reset.demo_mode = demo_mode;
    }

    // Parse address
    let addr: SocketAddr = config.server.address.parse().map_err(|e| {
        jobcast::JobcastError::Configuration(format!("Invalid address: {e}"))
    })?;

    let storage = Arc::new(config.storage()?);
    let service = Arc::new(config.builder(storage)?.build()?);
    service.start()?;

    let listener = TcpListener::bind(addr).await?;
    info!(version = jobcast::PKG_VERSION, %addr, "jobcastd starting");

    jobcast::server::serve(listener, Arc::clone(&service), async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;

    service.shutdown();
    Ok(())
}
