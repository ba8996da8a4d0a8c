//! 16-byte digest value

use crate::error::DigestError;
use crate::hash::OUTPUT_SIZE;
use std::fmt;
use std::str::FromStr;

/// Photon-128 digest (16 bytes)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Digest([u8; OUTPUT_SIZE]);

impl Digest {
    /// Size in bytes
    pub const LEN: usize = OUTPUT_SIZE;

    /// All-zero digest, the digest of empty input
    pub const ZERO: Digest = Digest([0u8; OUTPUT_SIZE]);

    /// Create from bytes
    pub const fn from_bytes(bytes: [u8; OUTPUT_SIZE]) -> Self {
        Digest(bytes)
    }

    /// Create from slice
    pub fn from_slice(slice: &[u8]) -> Result<Self, DigestError> {
        if slice.len() != OUTPUT_SIZE {
            return Err(DigestError::InvalidLength {
                expected: OUTPUT_SIZE,
                got: slice.len(),
            });
        }
        let mut bytes = [0u8; OUTPUT_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Digest(bytes))
    }

    /// Parse from hex string, with or without a `0x` prefix
    pub fn from_hex(s: &str) -> Result<Self, DigestError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| DigestError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Get as bytes
    pub fn as_bytes(&self) -> &[u8; OUTPUT_SIZE] {
        &self.0
    }

    /// Lowercase hex, no prefix. This is the wire form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; OUTPUT_SIZE]> for Digest {
    fn from(bytes: [u8; OUTPUT_SIZE]) -> Self {
        Digest(bytes)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use super::*;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    impl Serialize for Digest {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_str(&self.to_hex())
        }
    }

    impl<'de> Deserialize<'de> for Digest {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s: String = Deserialize::deserialize(deserializer)?;
            Digest::from_hex(&s).map_err(serde::de::Error::custom)
        }
    }
}
