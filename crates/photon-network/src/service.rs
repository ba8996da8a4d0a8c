//! Broadcast session

use crate::codec::MAX_FRAME_SIZE;
use crate::error::{NetworkError, NetworkResult};
use crate::log::MessageLog;
use crate::peer::PeerConnection;
use crate::types::{ClientMessage, MessageRecord, PeerId, ServerMessage};
use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Server configuration, shared by both transports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub listen_addr: SocketAddr,
    /// Maximum registered peers
    pub max_peers: usize,
    /// Frames queued per peer before the peer is dropped as unresponsive
    pub peer_queue_capacity: usize,
    /// Largest frame read from a peer, in bytes. Frames the server sends are
    /// not held to it.
    pub max_frame_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            max_peers: 64,
            peer_queue_capacity: 256,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

/// Outcome of one handled inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Message logged and relayed
    Accepted {
        /// The logged record
        record: MessageRecord,
        /// Number of peers it was queued for
        delivered: usize,
    },
    /// History sent back to the requester
    HistorySent {
        /// Number of records in the snapshot
        count: usize,
    },
}

/// Peer set and message log. Always accessed under one lock, so a broadcast
/// and a registration never observe each other half-done.
#[derive(Default)]
struct Session {
    peers: HashMap<PeerId, PeerConnection>,
    log: MessageLog,
}

impl Session {
    /// Queue `frame` for every peer except `exclude`, dropping peers that
    /// cannot take it. Returns how many peers it reached.
    fn fan_out(&mut self, frame: &Bytes, exclude: Option<&PeerId>) -> usize {
        let mut delivered = 0;
        let mut failed = Vec::new();

        for (peer_id, conn) in &self.peers {
            if Some(peer_id) == exclude {
                continue;
            }
            match conn.deliver(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("Failed to send to peer {}: {}", peer_id, e);
                    failed.push(*peer_id);
                }
            }
        }

        for peer_id in failed {
            self.peers.remove(&peer_id);
            info!("Dropped peer {} after failed delivery", peer_id);
        }
        delivered
    }
}

/// Transport-agnostic broadcast service.
///
/// Owns the peer set and the message log. Transports register each
/// connection, feed it raw inbound payloads, and drain its outbound queue.
pub struct BroadcastService {
    config: ServerConfig,
    session: Mutex<Session>,
    next_peer_id: AtomicU64,
}

impl BroadcastService {
    /// Create a service with an empty log and no peers
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            session: Mutex::new(Session::default()),
            next_peer_id: AtomicU64::new(1),
        }
    }

    /// Configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Allocate a fresh peer id
    pub fn next_peer_id(&self) -> PeerId {
        PeerId::new(self.next_peer_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Allocate an id and outbound queue for a new connection and register it.
    ///
    /// The returned receiver yields encoded frames, starting with the history
    /// snapshot.
    pub fn connect(&self, addr: SocketAddr) -> NetworkResult<(PeerId, mpsc::Receiver<Bytes>)> {
        let peer_id = self.next_peer_id();
        let (conn, outbound) = PeerConnection::new(peer_id, addr, self.config.peer_queue_capacity);
        self.register(conn)?;
        Ok((peer_id, outbound))
    }

    /// Add a peer and queue the current history for it
    pub fn register(&self, conn: PeerConnection) -> NetworkResult<()> {
        let mut session = self.session.lock();

        if session.peers.len() >= self.config.max_peers {
            return Err(NetworkError::MaxPeers(self.config.max_peers));
        }
        if session.peers.contains_key(&conn.peer_id) {
            return Err(NetworkError::AlreadyConnected(conn.peer_id.to_string()));
        }

        let snapshot = ServerMessage::History {
            messages: session.log.snapshot(),
        }
        .encode()?;
        conn.deliver(snapshot)?;

        info!(
            "Registered peer {} at {} ({} records replayed)",
            conn.peer_id,
            conn.addr,
            session.log.len()
        );
        session.peers.insert(conn.peer_id, conn);
        Ok(())
    }

    /// Remove a peer. Returns whether it was registered.
    pub fn unregister(&self, peer_id: &PeerId) -> bool {
        let removed = self.session.lock().peers.remove(peer_id);
        match removed {
            Some(conn) => {
                info!(
                    "Unregistered peer {} at {} after {:?}",
                    peer_id,
                    conn.addr,
                    conn.connected_at.elapsed()
                );
                true
            }
            None => false,
        }
    }

    /// Parse and handle one raw payload from `from`.
    ///
    /// A payload that does not parse is rejected with
    /// [`NetworkError::InvalidMessage`] and changes nothing.
    pub fn handle_inbound(&self, from: &PeerId, raw: &[u8]) -> NetworkResult<Inbound> {
        let msg = ClientMessage::decode(raw)?;
        self.handle_message(from, msg)
    }

    /// Handle one decoded message from `from`
    pub fn handle_message(&self, from: &PeerId, msg: ClientMessage) -> NetworkResult<Inbound> {
        match msg {
            ClientMessage::Message {
                message, timestamp, ..
            } => self.accept(from, MessageRecord::new(message, timestamp)),
            ClientMessage::RequestHistory => {
                let count = self.send_history(from)?;
                Ok(Inbound::HistorySent { count })
            }
        }
    }

    /// Log a record and relay it to everyone but the sender, atomically.
    fn accept(&self, from: &PeerId, record: MessageRecord) -> NetworkResult<Inbound> {
        let frame = ServerMessage::Message(record.clone()).encode()?;

        let mut session = self.session.lock();
        let index = session.log.append(record.clone());
        let delivered = session.fan_out(&frame, Some(from));
        drop(session);

        debug!(
            "Accepted message #{} from {} ({}), relayed to {} peers",
            index, from, record.hash, delivered
        );
        Ok(Inbound::Accepted { record, delivered })
    }

    /// Deliver `record` to every peer except `exclude`.
    ///
    /// Peers whose delivery fails are unregistered. Returns the number of
    /// peers reached.
    pub fn broadcast(&self, record: &MessageRecord, exclude: Option<&PeerId>) -> NetworkResult<usize> {
        let frame = ServerMessage::Message(record.clone()).encode()?;
        Ok(self.session.lock().fan_out(&frame, exclude))
    }

    /// Send the full log to one peer. Returns the number of records sent.
    pub fn send_history(&self, to: &PeerId) -> NetworkResult<usize> {
        let mut session = self.session.lock();
        let conn = session
            .peers
            .get(to)
            .ok_or_else(|| NetworkError::PeerNotFound(to.to_string()))?;

        let count = session.log.len();
        let frame = ServerMessage::History {
            messages: session.log.snapshot(),
        }
        .encode()?;

        if let Err(e) = conn.deliver(frame) {
            warn!("Failed to send history to peer {}: {}", to, e);
            session.peers.remove(to);
            return Err(e);
        }
        debug!("Sent {} records to {}", count, to);
        Ok(count)
    }

    /// Number of registered peers
    pub fn peer_count(&self) -> usize {
        self.session.lock().peers.len()
    }

    /// Whether `peer_id` is registered
    pub fn has_peer(&self, peer_id: &PeerId) -> bool {
        self.session.lock().peers.contains_key(peer_id)
    }

    /// Copy of the message log
    pub fn history(&self) -> Vec<MessageRecord> {
        self.session.lock().log.snapshot()
    }

    /// Number of logged messages
    pub fn history_len(&self) -> usize {
        self.session.lock().log.len()
    }
}
