//! # localvcs-store
//!
//! Persistent storage behind a local, in-IDE version-control log:
//! - Whole-snapshot persistence of the entry tree, entry counter and
//!   change history
//! - Immutable, id-addressed content blobs with a size ceiling and purge
//!   tombstones
//! - Schema version stamp; mismatch wipes and reinitializes
//! - Corruption in either artifact resets both instead of crashing the host
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     LocalVcsStorage                          │
//! │          (open / store / load / content / close)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │        VersionGate  →  RecoveryCoordinator                   │
//! │   (stamp check, wipe)    (cross-store consistency)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ IndexStore  │          │ContentStore │
//!   │  "storage"  │          │ "contents"  │
//!   └─────────────┘          └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod model;
pub mod index;
pub mod content;
pub mod gate;
pub mod recovery;
pub mod storage;
pub mod inspector;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, SyncStrategy, MAX_CONTENT_LENGTH, SCHEMA_VERSION};
pub use content::Content;
pub use error::{Result, StorageError};
pub use gate::OpenReport;
pub use inspector::{IndexSummary, Inspector, VerifyReport};
pub use model::{Change, ChangeList, ChangeSet, ContentId, Entry, EntryId, EntryKind, Snapshot};
pub use storage::LocalVcsStorage;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of localvcs-store
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
