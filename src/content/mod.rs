//! Content Module
//!
//! Immutable, id-addressed blobs with purge tombstones.
//!
//! ## Responsibilities
//! - Allocate content ids (never reused within a generation)
//! - Durably append blobs; refuse oversize ones
//! - Random-access reads by id with CRC verification
//! - Persist purge tombstones
//! - Degrade to `Broken` on the first integrity failure
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Header (6 bytes)                                         │
//! │   Magic: "LVCT" (4) | Format: u16 (2)                    │
//! ├──────────────────────────────────────────────────────────┤
//! │ Record (17 + Len bytes)                                  │
//! │   Kind: u8 (1) | Id: u64 (8) | Len: u32 (4) | CRC: u32 (4)│
//! │   Data (Len)                                             │
//! │   ... repeated, append-only ...                          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//! Kind 1 is a blob, kind 2 a purge tombstone (no data). The CRC covers
//! kind, id, len and data.

mod probe;
mod record;
mod store;

use bytes::Bytes;

use crate::model::ContentId;

pub use probe::{probe, ProbeReport};
pub(crate) use probe::{read_location, scan};
pub use record::{RecordHeader, RecordKind};
pub use store::{CompactionStats, ContentStats, ContentStore, Health};

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic bytes identifying a content artifact
pub(crate) const MAGIC: &[u8; 4] = b"LVCT";

/// Current content artifact format
pub(crate) const FORMAT: u16 = 1;

/// File header size: Magic (4) + Format (2)
pub const FILE_HEADER_SIZE: u64 = 6;

/// Record header size: Kind (1) + Id (8) + Len (4) + CRC (4)
pub const RECORD_HEADER_SIZE: usize = 17;

// =============================================================================
// Content
// =============================================================================

/// Result of `store_content`
///
/// `Unavailable` stands for "no bytes, no id": the blob was too large or the
/// store could not take it. It is a plain unit variant, so every
/// `Unavailable` is the same value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Stored blob with its id and bytes
    Available { id: ContentId, data: Bytes },

    /// Nothing was stored
    Unavailable,
}

impl Content {
    /// Id of an available blob
    pub fn id(&self) -> Option<ContentId> {
        match self {
            Content::Available { id, .. } => Some(*id),
            Content::Unavailable => None,
        }
    }

    /// Bytes of an available blob
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Content::Available { data, .. } => Some(&data[..]),
            Content::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Content::Available { .. })
    }
}
