mod api;
mod auth;
mod cli;
mod config;
mod error;
mod persistence;
mod server;
mod stats;

use anyhow::{Context, Result};
use clap::Parser;
use cli::CliArgs;
use mimalloc::MiMalloc;
use server::NodeServer;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> Result<()> {
    let args = CliArgs::parse();
    let config = args.resolve()?;

    let _log_guard = common::init_tracing(
        config.log_dir.as_deref(),
        &config.log_file,
        &config.log_level,
        config.console_port,
    );

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(threads) = config.runtime_threads {
        builder.worker_threads(threads.max(1));
    }
    let runtime = builder.build().context("Failed to build tokio runtime")?;

    runtime.block_on(run(config))
}

async fn run(config: config::NodeConfig) -> Result<()> {
    info!("Starting node on {}", config.listen_addr);
    info!("Snapshot file: {}", config.data_file.display());
    info!("Log level: {}", config.log_level);
    match config.runtime_threads {
        Some(threads) => info!("Runtime threads: {}", threads),
        None => info!("Runtime threads: default (CPU cores)"),
    }

    let server = NodeServer::new(config)
        .await
        .context("Failed to initialize node")?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
        signal.cancel();
    });

    server.run(shutdown).await?;
    info!("Node stopped");
    Ok(())
}
