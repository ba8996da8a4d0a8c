//! Network error types

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Pause after an accept error that is not tied to one connection.
pub(crate) const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Network errors
#[derive(Debug, Error)]
pub enum NetworkError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to bind the listening socket
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested listen address
        addr: std::net::SocketAddr,
        /// Underlying error
        source: std::io::Error,
    },

    /// Inbound payload could not be parsed as a protocol message
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Encoding error
    #[error("codec error: {0}")]
    Codec(String),

    /// Frame length exceeds the configured maximum
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Announced frame length
        size: usize,
        /// Configured maximum
        max: usize,
    },

    /// Zero-length frame
    #[error("empty frame")]
    EmptyFrame,

    /// Peer not found
    #[error("peer not found: {0}")]
    PeerNotFound(String),

    /// Already registered
    #[error("already connected to peer: {0}")]
    AlreadyConnected(String),

    /// Peer limit reached
    #[error("max peers reached ({0})")]
    MaxPeers(usize),

    /// Peer outbound queue is full
    #[error("outbound queue full for peer: {0}")]
    QueueFull(String),

    /// Channel closed
    #[error("channel closed")]
    ChannelClosed,
}

/// Result type for network operations
pub type NetworkResult<T> = Result<T, NetworkError>;

/// How long an accept loop waits after `err` before accepting again.
///
/// Failures of a single pending connection retry at once. Anything else, such
/// as running out of file descriptors, waits [`ACCEPT_BACKOFF`].
pub(crate) fn accept_backoff(err: &io::Error) -> Option<Duration> {
    match err.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock => None,
        _ => Some(ACCEPT_BACKOFF),
    }
}
