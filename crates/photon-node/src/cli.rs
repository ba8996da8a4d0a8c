//! CLI argument parsing for photon

use crate::config::ServerMode;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Photon Relay: digest-tagged message broadcast
#[derive(Parser, Debug, Clone)]
#[command(name = "photon")]
#[command(about = "Photon Relay message broadcast server and client")]
#[command(version)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run a broadcast server
    Serve(ServeArgs),
    /// Send one message and print its digest
    Send {
        /// Server address
        #[arg(long, default_value = "127.0.0.1:5000")]
        server: SocketAddr,
        /// Timestamp to attach
        #[arg(long)]
        timestamp: Option<String>,
        /// Message text
        message: String,
    },
    /// Fetch and verify the message history
    History {
        /// Server address
        #[arg(long, default_value = "127.0.0.1:5000")]
        server: SocketAddr,
    },
    /// Print the Photon-128 digest of a string
    Digest {
        /// Text to hash
        text: String,
    },
}

/// Arguments for `photon serve`
#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    /// Config file (JSON); flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Server binding
    #[arg(long, value_enum)]
    pub mode: Option<ServerMode>,

    /// Listen address
    #[arg(long)]
    pub listen: Option<SocketAddr>,

    /// Maximum connected peers
    #[arg(long)]
    pub max_peers: Option<usize>,

    /// Frames queued per peer before it is dropped
    #[arg(long)]
    pub queue_capacity: Option<usize>,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::parse_from(["photon", "serve"]);
        assert_eq!(cli.log_level, "info");
        assert!(!cli.log_json);
        match cli.command {
            Command::Serve(args) => {
                assert!(args.config.is_none());
                assert!(args.mode.is_none());
                assert!(args.listen.is_none());
                assert!(args.max_peers.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_serve_custom_values() {
        let cli = Cli::parse_from([
            "photon",
            "--log-level", "debug",
            "serve",
            "--mode", "event-loop",
            "--listen", "0.0.0.0:8765",
            "--max-peers", "8",
            "--queue-capacity", "16",
            "--config", "/etc/photon.json",
        ]);
        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Command::Serve(args) => {
                assert_eq!(args.mode, Some(ServerMode::EventLoop));
                assert_eq!(args.listen.unwrap().to_string(), "0.0.0.0:8765");
                assert_eq!(args.max_peers, Some(8));
                assert_eq!(args.queue_capacity, Some(16));
                assert_eq!(args.config, Some(PathBuf::from("/etc/photon.json")));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_send_args() {
        let cli = Cli::parse_from(["photon", "send", "--timestamp", "10:00", "hello there"]);
        match cli.command {
            Command::Send {
                server,
                timestamp,
                message,
            } => {
                assert_eq!(server.to_string(), "127.0.0.1:5000");
                assert_eq!(timestamp.as_deref(), Some("10:00"));
                assert_eq!(message, "hello there");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_history_args() {
        let cli = Cli::parse_from(["photon", "history", "--server", "10.0.0.1:6000"]);
        assert!(matches!(cli.command, Command::History { server } if server.port() == 6000));
    }

    #[test]
    fn test_digest_args() {
        let cli = Cli::parse_from(["photon", "digest", "abc"]);
        assert!(matches!(cli.command, Command::Digest { ref text } if text == "abc"));
    }

    #[test]
    fn test_invalid_mode_rejected() {
        assert!(Cli::try_parse_from(["photon", "serve", "--mode", "fork"]).is_err());
    }
}
