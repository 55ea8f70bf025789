//! Entry tree
//!
//! Rooted tree of named entries. Directories own their children keyed by
//! name; files optionally reference a blob in the content store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ContentId, EntryId};

/// A node of the versioned filesystem tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Unique id, assigned from the snapshot's entry counter
    pub id: EntryId,

    /// Name within the parent directory (empty for the root)
    pub name: String,

    /// File or directory payload
    pub kind: EntryKind,
}

/// What an entry is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    /// Directory with children keyed by name
    Directory { children: BTreeMap<String, Entry> },

    /// File whose bytes live in the content store
    /// (`None` when the content was unavailable at record time)
    File {
        content: Option<ContentId>,
        timestamp: u64,
    },
}

impl Entry {
    /// The empty root directory (id 0)
    pub fn root() -> Self {
        Self::directory(EntryId(0), "")
    }

    pub fn directory(id: EntryId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: EntryKind::Directory {
                children: BTreeMap::new(),
            },
        }
    }

    pub fn file(id: EntryId, name: impl Into<String>, content: Option<ContentId>, timestamp: u64) -> Self {
        Self {
            id,
            name: name.into(),
            kind: EntryKind::File { content, timestamp },
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory { .. })
    }

    /// Add a child to a directory, replacing any child with the same name.
    ///
    /// Returns the child back if `self` is a file.
    pub fn add_child(&mut self, child: Entry) -> Result<Option<Entry>, Entry> {
        match &mut self.kind {
            EntryKind::Directory { children } => Ok(children.insert(child.name.clone(), child)),
            EntryKind::File { .. } => Err(child),
        }
    }

    /// Remove a child by name
    pub fn remove_child(&mut self, name: &str) -> Option<Entry> {
        match &mut self.kind {
            EntryKind::Directory { children } => children.remove(name),
            EntryKind::File { .. } => None,
        }
    }

    /// Look up a direct child by name
    pub fn child(&self, name: &str) -> Option<&Entry> {
        match &self.kind {
            EntryKind::Directory { children } => children.get(name),
            EntryKind::File { .. } => None,
        }
    }

    /// Direct children in name order (empty for files)
    pub fn children(&self) -> impl Iterator<Item = &Entry> {
        let children = match &self.kind {
            EntryKind::Directory { children } => Some(children.values()),
            EntryKind::File { .. } => None,
        };
        children.into_iter().flatten()
    }

    pub fn child_count(&self) -> usize {
        match &self.kind {
            EntryKind::Directory { children } => children.len(),
            EntryKind::File { .. } => 0,
        }
    }

    /// Largest id anywhere in this subtree
    pub fn max_id(&self) -> EntryId {
        self.children()
            .map(Entry::max_id)
            .fold(self.id, std::cmp::max)
    }

    /// Every content id referenced by files in this subtree
    pub fn content_ids(&self) -> Vec<ContentId> {
        let mut ids = Vec::new();
        self.collect_content_ids(&mut ids);
        ids
    }

    fn collect_content_ids(&self, out: &mut Vec<ContentId>) {
        match &self.kind {
            EntryKind::File {
                content: Some(id), ..
            } => out.push(*id),
            EntryKind::File { content: None, .. } => {}
            EntryKind::Directory { children } => {
                for child in children.values() {
                    child.collect_content_ids(out);
                }
            }
        }
    }
}
