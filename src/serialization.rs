//! Payload encoding for event bodies, headers and snapshots.
//!
//! The persistence engine treats payloads as opaque bytes. A `Serializer`
//! turns the JSON value tree of a payload into those bytes and back.

use crate::storage::StorageError;

/// Encode/decode pair for stored payloads.
pub trait Serializer: Send + Sync {
    fn serialize(&self, value: &serde_json::Value) -> Result<Vec<u8>, StorageError>;

    fn deserialize(&self, bytes: &[u8]) -> Result<serde_json::Value, StorageError>;
}

/// UTF-8 JSON payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, value: &serde_json::Value) -> Result<Vec<u8>, StorageError> {
        serde_json::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<serde_json::Value, StorageError> {
        serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
    }
}
