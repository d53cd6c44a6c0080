//! WebSocket bridge exposing UCI engine analysis to the browser.
//!
//! Each WebSocket connection gets its own engine session: the engine is
//! started and configured on connect, driven by JSON requests, and its
//! MultiPV lines and best moves are pushed back as JSON. The session is
//! terminated when the socket closes.

mod config;
mod connection;
mod protocol;

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use uci_session::{EngineLauncher, ProcessLauncher};

use config::Config;

/// WebSocket bridge for UCI engine analysis.
#[derive(Parser)]
#[command(name = "analysis-bridge")]
#[command(about = "Serves UCI engine analysis over WebSocket")]
struct Args {
    /// Path to bridge.toml (defaults to searching the working directory and its parents)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to listen on, overriding the config file
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).await?;
    if let Some(port) = args.port {
        config.port = port;
    }
    let config = Arc::new(config);
    let launcher: Arc<dyn EngineLauncher> =
        Arc::new(ProcessLauncher::from_command_line(&config.engine.command)?);

    let addr: SocketAddr = format!("127.0.0.1:{}", config.port).parse()?;
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Analysis bridge listening on ws://{}", addr);
    tracing::info!("Engine: {} (default depth {})", config.engine.command, config.engine.depth);

    while let Ok((stream, peer)) = listener.accept().await {
        let config = Arc::clone(&config);
        let launcher = Arc::clone(&launcher);
        tokio::spawn(async move {
            if let Err(e) = connection::handle_connection(stream, peer, config, launcher).await {
                tracing::warn!("Connection error from {}: {}", peer, e);
            }
        });
    }

    Ok(())
}
