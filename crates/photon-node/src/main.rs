//! Photon Relay binary
//!
//! `photon serve` runs a broadcast server; `send`, `history` and `digest` are
//! one-shot client commands.

mod cli;
mod config;

use anyhow::{Context, Result};
use cli::{Cli, Command};
use config::{NodeConfig, ServerMode};
use photon_network::{run_current_thread, BlockingServer, PeerClient};
use std::net::SocketAddr;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(&cli);

    match cli.command {
        Command::Serve(args) => {
            let config = NodeConfig::from_args(&args)?;
            serve(config)
        }
        Command::Send {
            server,
            timestamp,
            message,
        } => send(server, &message, timestamp),
        Command::History { server } => history(server),
        Command::Digest { text } => {
            println!("{}", photon_crypto::photon128(text.as_bytes()));
            Ok(())
        }
    }
}

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

fn serve(config: NodeConfig) -> Result<()> {
    tracing::info!("Photon Relay starting ({:?})", config.mode);

    match config.mode {
        ServerMode::Threaded => {
            let server = BlockingServer::bind(config.server).context("starting server")?;
            server.run()?;
        }
        ServerMode::EventLoop => {
            run_current_thread(config.server, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
                tracing::info!("Shutdown signal received");
            })
            .context("running event loop")?;
        }
    }

    tracing::info!("Photon Relay stopped");
    Ok(())
}

fn send(server: SocketAddr, message: &str, timestamp: Option<String>) -> Result<()> {
    let mut client = PeerClient::connect(server)
        .with_context(|| format!("connecting to {}", server))?;
    let digest = client.send_message(message, timestamp)?;
    client.shutdown()?;
    println!("{}", digest);
    Ok(())
}

fn history(server: SocketAddr) -> Result<()> {
    let mut client = PeerClient::connect(server)
        .with_context(|| format!("connecting to {}", server))?;
    let records = client.fetch_history()?;
    client.shutdown()?;

    for entry in &records {
        println!("{}", serde_json::to_string(&entry.record)?);
        if !entry.verified {
            tracing::warn!("Digest mismatch for message {:?}", entry.record.message);
        }
    }
    tracing::info!("{} messages from {}", records.len(), client.peer_addr());
    Ok(())
}
