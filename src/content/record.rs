//! Content records
//!
//! Encoding of the per-blob / per-tombstone records appended to the
//! content artifact.

use crate::error::{Result, StorageError};
use crate::model::ContentId;

use super::{FORMAT, MAGIC, RECORD_HEADER_SIZE};

/// Record type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Blob = 1,
    Purge = 2,
}

impl RecordKind {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(RecordKind::Blob),
            2 => Some(RecordKind::Purge),
            _ => None,
        }
    }
}

/// Decoded fixed-size part of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub kind: RecordKind,
    pub id: ContentId,
    pub len: u32,
    pub crc: u32,
}

impl RecordHeader {
    pub fn decode(bytes: &[u8; RECORD_HEADER_SIZE]) -> Result<Self> {
        let kind = RecordKind::from_byte(bytes[0]).ok_or_else(|| {
            StorageError::content_corruption(None, format!("Unknown record kind: {}", bytes[0]))
        })?;

        let mut id_bytes = [0u8; 8];
        id_bytes.copy_from_slice(&bytes[1..9]);
        let id = ContentId(u64::from_le_bytes(id_bytes));

        let len = u32::from_le_bytes([bytes[9], bytes[10], bytes[11], bytes[12]]);
        let crc = u32::from_le_bytes([bytes[13], bytes[14], bytes[15], bytes[16]]);

        if kind == RecordKind::Purge && len != 0 {
            return Err(StorageError::content_corruption(
                Some(id),
                format!("Tombstone carries {} data bytes", len),
            ));
        }

        Ok(Self { kind, id, len, crc })
    }

    /// Check `data` against the stored checksum
    pub fn verify(&self, data: &[u8]) -> Result<()> {
        let computed = record_crc(self.kind, self.id, data);
        if computed != self.crc {
            return Err(StorageError::content_corruption(
                Some(self.id),
                format!(
                    "CRC mismatch for {}: expected {:#010x}, computed {:#010x}",
                    self.id, self.crc, computed
                ),
            ));
        }
        Ok(())
    }
}

/// Bytes of a fresh artifact header
pub(crate) fn file_header() -> [u8; 6] {
    let mut header = [0u8; 6];
    header[0..4].copy_from_slice(MAGIC);
    header[4..6].copy_from_slice(&FORMAT.to_le_bytes());
    header
}

/// Validate an artifact header
pub(crate) fn check_file_header(header: &[u8; 6]) -> Result<()> {
    if &header[0..4] != MAGIC {
        return Err(StorageError::content_corruption(
            None,
            format!("Invalid content magic: expected LVCT, got {:?}", &header[0..4]),
        ));
    }
    let format = u16::from_le_bytes([header[4], header[5]]);
    if format != FORMAT {
        return Err(StorageError::content_corruption(
            None,
            format!("Unsupported content format: {}", format),
        ));
    }
    Ok(())
}

/// CRC over kind, id, len and data
pub(crate) fn record_crc(kind: RecordKind, id: ContentId, data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[kind as u8]);
    hasher.update(&id.0.to_le_bytes());
    hasher.update(&(data.len() as u32).to_le_bytes());
    hasher.update(data);
    hasher.finalize()
}

/// Encode a full record: header followed by data
pub(crate) fn encode_record(kind: RecordKind, id: ContentId, data: &[u8]) -> (RecordHeader, Vec<u8>) {
    let header = RecordHeader {
        kind,
        id,
        len: data.len() as u32,
        crc: record_crc(kind, id, data),
    };

    let mut record = Vec::with_capacity(RECORD_HEADER_SIZE + data.len());
    record.push(kind as u8);
    record.extend_from_slice(&id.0.to_le_bytes());
    record.extend_from_slice(&header.len.to_le_bytes());
    record.extend_from_slice(&header.crc.to_le_bytes());
    record.extend_from_slice(data);
    (header, record)
}
