//! Digest errors

use thiserror::Error;

/// Digest parsing error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DigestError {
    /// Invalid hex string
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    /// Invalid length
    #[error("invalid digest length: expected {expected} bytes, got {got}")]
    InvalidLength {
        /// Expected byte count
        expected: usize,
        /// Actual byte count
        got: usize,
    },
}
