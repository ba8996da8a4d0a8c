//! Registered peer handles

use crate::error::{NetworkError, NetworkResult};
use crate::types::PeerId;
use bytes::Bytes;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Handle to one connected peer.
///
/// Frames are queued on a bounded channel drained by the peer's writer
/// (a thread in the blocking server, a task in the event loop). Queuing never
/// blocks, so the service can deliver while holding its lock.
#[derive(Debug)]
pub struct PeerConnection {
    /// Peer ID
    pub peer_id: PeerId,
    /// Remote address
    pub addr: SocketAddr,
    /// Connection time
    pub connected_at: Instant,
    /// Outgoing frame sender
    sender: mpsc::Sender<Bytes>,
}

impl PeerConnection {
    /// Create a handle and the receiving end of its outbound queue
    pub fn new(peer_id: PeerId, addr: SocketAddr, capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let conn = Self {
            peer_id,
            addr,
            connected_at: Instant::now(),
            sender,
        };
        (conn, receiver)
    }

    /// Queue one encoded frame for this peer
    pub fn deliver(&self, frame: Bytes) -> NetworkResult<()> {
        self.sender.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => NetworkError::QueueFull(self.peer_id.to_string()),
            TrySendError::Closed(_) => NetworkError::ChannelClosed,
        })
    }
}
