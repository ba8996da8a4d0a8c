//! Wire types

use crate::error::{NetworkError, NetworkResult};
use bytes::Bytes;
use photon_crypto::{photon128, Digest};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Peer identifier, unique within one server process
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(u64);

impl PeerId {
    /// Create from a raw id
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// One accepted message, as logged and relayed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Message text
    pub message: String,
    /// Photon-128 digest of `message`, hex on the wire
    pub hash: Digest,
    /// Client-supplied timestamp, empty when none was given
    #[serde(default)]
    pub timestamp: String,
}

impl MessageRecord {
    /// Build a record, computing the digest of `message`
    pub fn new(message: impl Into<String>, timestamp: Option<String>) -> Self {
        let message = message.into();
        let hash = photon128(message.as_bytes());
        Self {
            message,
            hash,
            timestamp: timestamp.unwrap_or_default(),
        }
    }

    /// Whether `hash` matches a fresh digest of `message`
    pub fn verify(&self) -> bool {
        photon_crypto::verify(self.message.as_bytes(), &self.hash)
    }
}

/// Client to server messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Submit a message for relay
    Message {
        /// Message text
        message: String,
        /// Optional client timestamp
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
        /// Digest computed by the client. The server ignores it and
        /// computes its own.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hash: Option<String>,
    },
    /// Ask for the full message log
    #[serde(alias = "request_messages")]
    RequestHistory,
}

impl ClientMessage {
    /// Message submission without a client digest
    pub fn message(message: impl Into<String>, timestamp: Option<String>) -> Self {
        Self::Message {
            message: message.into(),
            timestamp,
            hash: None,
        }
    }

    /// Decode from a JSON payload
    pub fn decode(raw: &[u8]) -> NetworkResult<Self> {
        serde_json::from_slice(raw).map_err(|e| NetworkError::InvalidMessage(e.to_string()))
    }

    /// Encode to a JSON payload
    pub fn encode(&self) -> NetworkResult<Bytes> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| NetworkError::Codec(e.to_string()))
    }
}

/// Server to client messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A relayed message with its digest
    Message(MessageRecord),
    /// Full log snapshot, in acceptance order
    #[serde(alias = "message_history")]
    History {
        /// Every record accepted so far
        messages: Vec<MessageRecord>,
    },
}

impl ServerMessage {
    /// Decode from a JSON payload
    pub fn decode(raw: &[u8]) -> NetworkResult<Self> {
        serde_json::from_slice(raw).map_err(|e| NetworkError::InvalidMessage(e.to_string()))
    }

    /// Encode to a JSON payload
    pub fn encode(&self) -> NetworkResult<Bytes> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| NetworkError::Codec(e.to_string()))
    }
}
