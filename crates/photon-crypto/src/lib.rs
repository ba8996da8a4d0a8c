//! # photon-crypto
//!
//! The Photon-128 digest used to tag relayed messages.
//!
//! - Absorb/transform/squeeze over a 4-word state
//! - Streaming ([`Photon128`]) and one-shot ([`photon128`]) hashing
//! - 16-byte [`Digest`] value with hex encoding
//!
//! Photon-128 is a toy compression function. It is not collision resistant
//! and must not be used where a cryptographic hash is required.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod digest;
mod error;
mod hash;

pub use digest::Digest;
pub use error::DigestError;
pub use hash::{photon128, verify, Photon128, BLOCK_SIZE, OUTPUT_SIZE, ROTATION, STATE_WORDS};
