//! Configuration types for photon serve

use crate::cli::ServeArgs;
use anyhow::{Context, Result};
use photon_network::ServerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which transport binding to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ServerMode {
    /// One thread per connection
    #[default]
    Threaded,
    /// Single-threaded event loop
    EventLoop,
}

/// Node configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Transport binding
    pub mode: ServerMode,
    /// Server settings
    pub server: ServerConfig,
}

impl NodeConfig {
    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        tracing::info!("Loading config from {:?}", path);
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Build from `serve` arguments: file first, then flag overrides
    pub fn from_args(args: &ServeArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        if let Some(mode) = args.mode {
            config.mode = mode;
        }
        if let Some(listen) = args.listen {
            config.server.listen_addr = listen;
        }
        if let Some(max_peers) = args.max_peers {
            config.server.max_peers = max_peers;
        }
        if let Some(capacity) = args.queue_capacity {
            config.server.peer_queue_capacity = capacity;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn args() -> ServeArgs {
        ServeArgs {
            config: None,
            mode: None,
            listen: None,
            max_peers: None,
            queue_capacity: None,
        }
    }

    #[test]
    fn test_defaults() {
        let config = NodeConfig::from_args(&args()).unwrap();
        assert_eq!(config.mode, ServerMode::Threaded);
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_load_file() {
        let mut file = NamedTempFile::new().unwrap();
        let json = r#"{
            "mode": "event-loop",
            "server": {
                "listen_addr": "127.0.0.1:8765",
                "max_peers": 4
            }
        }"#;
        file.write_all(json.as_bytes()).unwrap();

        let config = NodeConfig::load(file.path()).unwrap();
        assert_eq!(config.mode, ServerMode::EventLoop);
        assert_eq!(config.server.listen_addr.to_string(), "127.0.0.1:8765");
        assert_eq!(config.server.max_peers, 4);
        assert_eq!(config.server.peer_queue_capacity, 256);
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{"mode": "event-loop", "server": {"max_peers": 4}}"#)
            .unwrap();

        let args = ServeArgs {
            config: Some(file.path().to_path_buf()),
            mode: Some(ServerMode::Threaded),
            max_peers: Some(9),
            ..args()
        };
        let config = NodeConfig::from_args(&args).unwrap();
        assert_eq!(config.mode, ServerMode::Threaded);
        assert_eq!(config.server.max_peers, 9);
    }

    #[test]
    fn test_missing_file() {
        let args = ServeArgs {
            config: Some("/nonexistent/photon.json".into()),
            ..args()
        };
        let err = NodeConfig::from_args(&args).unwrap_err();
        assert!(err.to_string().contains("reading config"));
    }

    #[test]
    fn test_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        let err = NodeConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("parsing config"));
    }
}
