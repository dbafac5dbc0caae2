//! Principal identities.
//!
//! A principal is an opaque 20-byte identity. Owners, deposit senders and
//! dispatch targets are all principals.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of a principal in bytes.
pub const PRINCIPAL_LEN: usize = 20;

/// Opaque, comparable identity (an address).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Principal([u8; PRINCIPAL_LEN]);

/// Errors from parsing a principal string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrincipalParseError {
    /// Not valid hex.
    #[error("invalid principal hex: {0}")]
    InvalidHex(String),

    /// Wrong number of bytes.
    #[error("principal must be {PRINCIPAL_LEN} bytes, got {0}")]
    InvalidLength(usize),
}

impl Principal {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; PRINCIPAL_LEN]) -> Self {
        Self(bytes)
    }

    /// Deterministic principal whose every byte is `byte`.
    ///
    /// Handy for fixtures: `Principal::repeat(1)` renders as `0x0101..01`.
    pub const fn repeat(byte: u8) -> Self {
        Self([byte; PRINCIPAL_LEN])
    }

    /// Get bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; PRINCIPAL_LEN]> for Principal {
    fn from(bytes: [u8; PRINCIPAL_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({})", self)
    }
}

impl FromStr for Principal {
    type Err = PrincipalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let bytes =
            hex::decode(digits).map_err(|e| PrincipalParseError::InvalidHex(e.to_string()))?;
        let array: [u8; PRINCIPAL_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| PrincipalParseError::InvalidLength(bytes.len()))?;
        Ok(Self(array))
    }
}

// Human-readable form on the wire so TOML/JSON configs stay editable.
impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
