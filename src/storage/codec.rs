// MessagePack encoding of stored cells.

use super::record::VersionedRecord;
use crate::core::{CollectionError, Entity, Result};

pub fn encode_record(record: &VersionedRecord) -> Result<Vec<u8>> {
    rmp_serde::to_vec(record).map_err(|e| {
        CollectionError::StorageUnavailable(format!("Failed to serialize record: {}", e))
    })
}

pub fn decode_record(bytes: &[u8]) -> Result<VersionedRecord> {
    rmp_serde::from_slice(bytes).map_err(|e| {
        CollectionError::StorageUnavailable(format!("Failed to deserialize record: {}", e))
    })
}

/// Canonical bytes of an entity; equal entities encode identically.
pub fn encode_entity(entity: &Entity) -> Result<Vec<u8>> {
    rmp_serde::to_vec(entity).map_err(|e| {
        CollectionError::StorageUnavailable(format!("Failed to serialize entity: {}", e))
    })
}
