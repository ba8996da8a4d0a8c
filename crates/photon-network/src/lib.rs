//! # photon-network
//!
//! Digest-tagged message broadcast.
//!
//! This crate provides:
//! - A transport-agnostic [`BroadcastService`] owning the peer set and the
//!   append-only [`MessageLog`]
//! - A thread-per-connection server ([`BlockingServer`])
//! - A single-threaded event-loop server ([`EventLoopServer`])
//! - A blocking [`PeerClient`] that re-verifies received digests
//!
//! ## Architecture
//!
//! ```text
//! +------------------+   +------------------+
//! |  BlockingServer  |   | EventLoopServer  |  <- transports
//! +------------------+   +------------------+
//!           \                  /
//!         +--------------------+
//!         |  BroadcastService  |  <- peers + log, one lock
//!         +--------------------+
//!                   |
//!         +--------------------+
//!         |     photon128      |  <- digest
//!         +--------------------+
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use photon_network::{BlockingServer, PeerClient, ServerConfig};
//!
//! let server = BlockingServer::bind(ServerConfig::default())?;
//! let addr = server.local_addr();
//! server.spawn()?;
//!
//! let mut alice = PeerClient::connect(addr)?;
//! let mut bob = PeerClient::connect(addr)?;
//! alice.send_message("hello", None)?;
//! let relayed = bob.recv()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod blocking;
mod client;
mod codec;
mod error;
mod event_loop;
mod log;
mod peer;
mod service;
mod types;

pub use blocking::{BlockingServer, ShutdownHandle};
pub use client::{
    verify, verify_history, PeerClient, ReceivedMessage, ReceivedRecord, VerifiedRecord,
};
pub use codec::{
    read_frame, write_frame, FrameCodec, LENGTH_PREFIX_SIZE, MAX_FRAME_SIZE, MAX_WIRE_FRAME_SIZE,
};
pub use error::{NetworkError, NetworkResult};
pub use event_loop::{run_current_thread, EventLoopServer};
pub use log::MessageLog;
pub use peer::PeerConnection;
pub use service::{BroadcastService, Inbound, ServerConfig};
pub use types::{ClientMessage, MessageRecord, PeerId, ServerMessage};
