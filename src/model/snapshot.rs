//! Snapshot
//!
//! The unit of `store` / `load`: tree, entry counter and history replaced
//! together.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};

use super::{ChangeList, Entry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub root: Entry,

    /// Last entry id handed out; never below any id in `root`
    pub entry_counter: u64,

    pub change_list: ChangeList,
}

impl Snapshot {
    /// `{ empty root, counter = 0, empty history }`
    pub fn empty() -> Self {
        Self {
            root: Entry::root(),
            entry_counter: 0,
            change_list: ChangeList::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.child_count() == 0 && self.entry_counter == 0 && self.change_list.is_empty()
    }

    /// Check that the counter covers every id in the tree
    pub fn validate(&self) -> Result<()> {
        let max_id = self.root.max_id();
        if max_id.0 > self.entry_counter {
            return Err(StorageError::InvalidSnapshot(format!(
                "entry counter {} is below {}",
                self.entry_counter, max_id
            )));
        }
        Ok(())
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}
