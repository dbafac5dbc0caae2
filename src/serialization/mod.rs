//! CBOR serialization for the durable record log.
//!
//! Records are stored as CBOR blobs via `ciborium`. New optional fields must
//! carry `#[serde(default)]` so older rows keep decoding.

use crate::ledger::Record;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Serialization errors.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// CBOR encoding failed.
    #[error("CBOR encoding failed: {0}")]
    Encode(String),

    /// CBOR decoding failed.
    #[error("CBOR decoding failed: {0}")]
    Decode(String),
}

/// Serialize to CBOR bytes.
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializationError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)
        .map_err(|e| SerializationError::Encode(format!("{:?}", e)))?;
    Ok(bytes)
}

/// Deserialize from CBOR bytes.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SerializationError> {
    ciborium::from_reader(bytes).map_err(|e| SerializationError::Decode(format!("{:?}", e)))
}

/// Encode a record for the log.
pub fn encode_record(record: &Record) -> Result<Vec<u8>, SerializationError> {
    to_cbor(record)
}

/// Decode a logged record, checking it sits at the expected position.
pub fn decode_record(seq: u64, bytes: &[u8]) -> Result<Record, SerializationError> {
    let record: Record = from_cbor(bytes)?;
    if record.seq != seq {
        return Err(SerializationError::Decode(format!(
            "record stored at {} claims seq {}",
            seq, record.seq
        )));
    }
    Ok(record)
}
