//! Index encoding
//!
//! Pure functions between `Snapshot` and index artifact bytes.

use crate::error::{Result, StorageError};
use crate::model::Snapshot;

use super::{IndexHeader, IndexState, FORMAT, HEADER_SIZE, MAGIC};

/// Encode a snapshot into a complete index artifact
pub fn encode_index(snapshot: &Snapshot, version: u32, state: IndexState) -> Result<Vec<u8>> {
    let payload = bincode::serialize(snapshot)?;
    let crc = crc32fast::hash(&payload);

    let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT.to_le_bytes());
    bytes.extend_from_slice(&version.to_le_bytes());
    bytes.push(state as u8);
    bytes.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&crc.to_le_bytes());
    bytes.extend_from_slice(&payload);

    Ok(bytes)
}

/// Decode only the header (enough to read the version stamp)
pub fn decode_header(bytes: &[u8]) -> Result<IndexHeader> {
    if bytes.len() < HEADER_SIZE {
        return Err(StorageError::IndexCorruption(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    if &bytes[0..4] != MAGIC {
        return Err(StorageError::IndexCorruption(format!(
            "Invalid index magic: expected LVIX, got {:?}",
            &bytes[0..4]
        )));
    }

    let format = u16::from_le_bytes([bytes[4], bytes[5]]);
    if format != FORMAT {
        return Err(StorageError::IndexCorruption(format!(
            "Unsupported index format: {}",
            format
        )));
    }

    let version = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);

    let state = IndexState::from_byte(bytes[10]).ok_or_else(|| {
        StorageError::IndexCorruption(format!("Unknown index state: {}", bytes[10]))
    })?;

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&bytes[11..19]);
    let payload_len = u64::from_le_bytes(len_bytes);

    let payload_crc = u32::from_le_bytes([bytes[19], bytes[20], bytes[21], bytes[22]]);

    Ok(IndexHeader {
        version,
        state,
        payload_len,
        payload_crc,
    })
}

/// Decode a complete index artifact, verifying length, checksum and the
/// snapshot's own invariants
pub fn decode_index(bytes: &[u8]) -> Result<(IndexHeader, Snapshot)> {
    let header = decode_header(bytes)?;

    let payload = &bytes[HEADER_SIZE..];
    if payload.len() as u64 != header.payload_len {
        return Err(StorageError::IndexCorruption(format!(
            "Payload length mismatch: header says {}, found {}",
            header.payload_len,
            payload.len()
        )));
    }

    let crc = crc32fast::hash(payload);
    if crc != header.payload_crc {
        return Err(StorageError::IndexCorruption(format!(
            "Payload CRC mismatch: expected {:#010x}, computed {:#010x}",
            header.payload_crc, crc
        )));
    }

    let snapshot: Snapshot = bincode::deserialize(payload)
        .map_err(|e| StorageError::IndexCorruption(format!("Snapshot decode failed: {}", e)))?;

    snapshot
        .validate()
        .map_err(|e| StorageError::IndexCorruption(e.to_string()))?;

    Ok((header, snapshot))
}
