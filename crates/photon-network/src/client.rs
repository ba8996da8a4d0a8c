//! Client-side peer
//!
//! Sends messages, requests history, and re-checks every received digest
//! locally. The check is for display only; nothing trusts it.

use crate::codec::{read_frame, write_frame, MAX_WIRE_FRAME_SIZE};
use crate::error::{NetworkError, NetworkResult};
use crate::types::{ClientMessage, MessageRecord};
use photon_crypto::{photon128, Digest};
use serde::{Deserialize, Serialize};
use std::io::BufReader;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

/// Recompute the digest of `content` and compare it to `received`
pub fn verify(content: &str, received: &Digest) -> bool {
    photon_crypto::verify(content.as_bytes(), received)
}

/// A record as a client receives it.
///
/// The digest is kept as the server sent it, so a malformed one shows up as a
/// failed check instead of an undecodable frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedRecord {
    /// Message text
    pub message: String,
    /// Digest as sent, normally 32 lowercase hex characters
    pub hash: String,
    /// Timestamp as sent
    #[serde(default)]
    pub timestamp: String,
}

impl ReceivedRecord {
    /// Parsed digest, if the sent one is well formed
    pub fn digest(&self) -> Option<Digest> {
        Digest::from_hex(&self.hash).ok()
    }

    /// Whether the sent digest is well formed and matches the text
    pub fn verify(&self) -> bool {
        self.digest()
            .map_or(false, |digest| verify(&self.message, &digest))
    }
}

impl From<MessageRecord> for ReceivedRecord {
    fn from(record: MessageRecord) -> Self {
        Self {
            hash: record.hash.to_hex(),
            message: record.message,
            timestamp: record.timestamp,
        }
    }
}

/// Server frame as a client decodes it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReceivedMessage {
    /// Relayed message
    Message(ReceivedRecord),
    /// Full log
    #[serde(alias = "message_history")]
    History {
        /// Records, oldest first
        messages: Vec<ReceivedRecord>,
    },
}

impl ReceivedMessage {
    /// Decode one server payload
    pub fn decode(raw: &[u8]) -> NetworkResult<Self> {
        serde_json::from_slice(raw).map_err(|e| NetworkError::InvalidMessage(e.to_string()))
    }
}

/// A received record and the outcome of checking its digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedRecord {
    /// Record as received
    pub record: ReceivedRecord,
    /// Whether the digest matched the content
    pub verified: bool,
}

impl From<ReceivedRecord> for VerifiedRecord {
    fn from(record: ReceivedRecord) -> Self {
        let verified = record.verify();
        Self { record, verified }
    }
}

/// Check every record of a history snapshot
pub fn verify_history(messages: Vec<ReceivedRecord>) -> Vec<VerifiedRecord> {
    messages.into_iter().map(VerifiedRecord::from).collect()
}

/// Blocking client connection
pub struct PeerClient {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
    peer_addr: SocketAddr,
    initial_history: Vec<ReceivedRecord>,
}

impl PeerClient {
    /// Connect and wait for the registration snapshot.
    ///
    /// Returns once the server has registered this peer, so messages sent by
    /// others after this point are relayed to it.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> NetworkResult<Self> {
        let writer = TcpStream::connect(addr)?;
        writer.set_nodelay(true)?;
        let peer_addr = writer.peer_addr()?;
        let reader = BufReader::new(writer.try_clone()?);

        let mut client = Self {
            writer,
            reader,
            peer_addr,
            initial_history: Vec::new(),
        };

        match client.recv()? {
            ReceivedMessage::History { messages } => client.initial_history = messages,
            other => {
                return Err(NetworkError::InvalidMessage(format!(
                    "expected history snapshot, got {:?}",
                    other
                )))
            }
        }
        debug!(
            "Connected to {} ({} records in snapshot)",
            client.peer_addr,
            client.initial_history.len()
        );
        Ok(client)
    }

    /// Server address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Snapshot received on connect
    pub fn initial_history(&self) -> &[ReceivedRecord] {
        &self.initial_history
    }

    /// Limit how long [`recv`](Self::recv) blocks
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> NetworkResult<()> {
        self.reader.get_ref().set_read_timeout(timeout)?;
        Ok(())
    }

    /// Send a message, attaching the locally computed digest. Returns it.
    pub fn send_message(&mut self, text: &str, timestamp: Option<String>) -> NetworkResult<Digest> {
        let digest = photon128(text.as_bytes());
        let msg = ClientMessage::Message {
            message: text.to_string(),
            timestamp,
            hash: Some(digest.to_hex()),
        };
        self.send(&msg)?;
        Ok(digest)
    }

    /// Ask for the full message log
    pub fn request_history(&mut self) -> NetworkResult<()> {
        self.send(&ClientMessage::RequestHistory)
    }

    /// Send any client message
    pub fn send(&mut self, msg: &ClientMessage) -> NetworkResult<()> {
        let payload = msg.encode()?;
        self.send_raw(&payload)
    }

    /// Send an arbitrary payload as one frame
    pub fn send_raw(&mut self, payload: &[u8]) -> NetworkResult<()> {
        write_frame(&mut self.writer, payload)
    }

    /// Block for the next server message.
    ///
    /// Server frames are not held to the server's inbound limit: a history
    /// snapshot grows with the log.
    pub fn recv(&mut self) -> NetworkResult<ReceivedMessage> {
        match read_frame(&mut self.reader, MAX_WIRE_FRAME_SIZE)? {
            Some(payload) => ReceivedMessage::decode(&payload),
            None => Err(NetworkError::ChannelClosed),
        }
    }

    /// Request history and wait for it, skipping relays that arrive first
    pub fn fetch_history(&mut self) -> NetworkResult<Vec<VerifiedRecord>> {
        self.request_history()?;
        loop {
            match self.recv()? {
                ReceivedMessage::History { messages } => return Ok(verify_history(messages)),
                ReceivedMessage::Message(record) => {
                    debug!("Skipping relayed message while waiting for history: {}", record.hash)
                }
            }
        }
    }

    /// Close both directions
    pub fn shutdown(&self) -> NetworkResult<()> {
        self.writer.shutdown(Shutdown::Both)?;
        Ok(())
    }
}
