//! Change history
//!
//! Changes are recorded by the VCS engine and replayed by it; here they are
//! only data. Paths are '/'-separated and relative to the root.

use serde::{Deserialize, Serialize};

use super::{ContentId, EntryId};

/// A single recorded tree mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change {
    CreateFile {
        id: EntryId,
        path: String,
        content: Option<ContentId>,
        timestamp: u64,
    },
    CreateDirectory {
        id: EntryId,
        path: String,
    },
    ChangeFileContent {
        path: String,
        new_content: Option<ContentId>,
        timestamp: u64,
    },
    Rename {
        path: String,
        new_name: String,
    },
    Move {
        path: String,
        new_parent: String,
    },
    Delete {
        path: String,
    },
}

/// Changes recorded together (one user action)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub label: Option<String>,
    pub timestamp: u64,
    pub changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new(changes: Vec<Change>) -> Self {
        Self {
            label: None,
            timestamp: 0,
            changes,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Append-ordered history of change sets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeList {
    change_sets: Vec<ChangeSet>,
}

impl ChangeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_change_set(&mut self, change_set: ChangeSet) {
        self.change_sets.push(change_set);
    }

    /// Change sets, oldest first
    pub fn change_sets(&self) -> &[ChangeSet] {
        &self.change_sets
    }

    pub fn len(&self) -> usize {
        self.change_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.change_sets.is_empty()
    }
}
