#![doc = include_str!("../README.md")]

mod cli;
mod telemetry;

use clap::Parser;
use cli::CliArgs;
use tokio::signal;
use turnstile::{Server, ServerConfig};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    telemetry::init_telemetry();

    tracing::info!(
        port = config.port,
        workers = config.max_workers,
        counter_file = %config.counter_path.display(),
        access_log = %config.access_log_path.display(),
        "starting turnstile server"
    );

    let server = Server::start(config).await?;

    shutdown_signal().await;
    server.shutdown().await;

    tracing::info!("service shut down successfully");
    Ok(())
}

/// Resolves when the process receives Ctrl+C or, on Unix, SIGTERM. Both
/// triggers funnel into the same `Server::shutdown` call.
async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C signal"),
        () = terminate => tracing::info!("received SIGTERM signal"),
    }
}
