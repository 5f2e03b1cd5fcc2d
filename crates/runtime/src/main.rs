#![deny(clippy::all, clippy::pedantic)]

use anyhow::Result;
use clap::Parser;
use runtime::{Cli, RunConfig};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = RunConfig::from_cli(&cli)?;
    tracing::info!(
        width = config.width,
        height = config.height,
        workers = config.worker_count(),
        backend = ?config.backend,
        "starting bulbshell"
    );
    let summary = runtime::run(&config)?;
    println!("{}", summary.location);
    for path in &summary.exported {
        tracing::debug!("exported {}", path.display());
    }
    Ok(())
}
