//! Model Module
//!
//! The aggregates persisted by the index store.
//!
//! ## Responsibilities
//! - Entry tree with monotonically assigned ids
//! - Ordered change history (change sets of opaque changes)
//! - The snapshot triple stored and loaded as one unit
//!
//! The storage layer round-trips these structurally; it never applies a
//! change to a tree.

mod change;
mod entry;
mod snapshot;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use change::{Change, ChangeList, ChangeSet};
pub use entry::{Entry, EntryKind};
pub use snapshot::Snapshot;

/// Identifier of a node in the entry tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryId(pub u64);

/// Identifier of a blob in the content store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry#{}", self.0)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "content#{}", self.0)
    }
}
