//! Index Module
//!
//! Whole-snapshot persistence of the entry tree, the entry counter and the
//! change list, together with the schema version stamp.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Header (23 bytes)                                           │
//! │   Magic: "LVIX" (4) | Format: u16 (2) | Stamp: u32 (4)      │
//! │   State: u8 (1) | PayloadLen: u64 (8) | PayloadCRC: u32 (4) │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Payload (PayloadLen bytes)                                  │
//! │   bincode(Snapshot)                                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The file is always replaced whole (temp file + rename), so a reader sees
//! either the previous snapshot or the new one.

mod format;
mod store;

pub use format::{decode_header, decode_index, encode_index};
pub use store::IndexStore;

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic bytes identifying an index artifact
pub(crate) const MAGIC: &[u8; 4] = b"LVIX";

/// Current index container format (independent of the schema stamp)
pub(crate) const FORMAT: u16 = 1;

/// Magic (4) + Format (2) + Stamp (4) + State (1) + PayloadLen (8) + CRC (4)
pub const HEADER_SIZE: usize = 23;

// =============================================================================
// Header
// =============================================================================

/// Whether the index can be trusted on the next open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    /// Consistent with the content artifact
    Clean = 0,

    /// The content store broke; wipe both artifacts on next open
    ResetPending = 1,
}

impl IndexState {
    pub(crate) fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(IndexState::Clean),
            1 => Some(IndexState::ResetPending),
            _ => None,
        }
    }
}

/// Decoded index header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    /// Schema version stamp
    pub version: u32,
    pub state: IndexState,
    pub payload_len: u64,
    pub payload_crc: u32,
}
