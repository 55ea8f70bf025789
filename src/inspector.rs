//! Inspector
//!
//! Read-only view of a storage directory. Nothing here opens the stores,
//! so a damaged directory, or one stamped with another version, is
//! reported as found instead of being reset.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::content::{self, ContentStore, ProbeReport};
use crate::error::{Result, StorageError};
use crate::index::{decode_index, IndexHeader, IndexState, IndexStore};
use crate::model::{ContentId, Snapshot};

/// Summary of a readable index artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSummary {
    /// Stamp found on disk
    pub version: u32,
    pub state: IndexState,
    pub entry_counter: u64,
    pub change_sets: usize,
    pub content_refs: usize,
    /// Referenced ids the content artifact never allocated
    /// (empty when the content artifact is unreadable)
    pub dangling: Vec<ContentId>,
}

/// Re-probe of both artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub expected_version: u32,
    pub index: std::result::Result<IndexSummary, String>,
    pub content: std::result::Result<ProbeReport, String>,
}

impl VerifyReport {
    /// Whether an open with the expected version would keep the directory
    /// as it is
    pub fn is_consistent(&self) -> bool {
        match (&self.index, &self.content) {
            (Ok(index), Ok(_)) => {
                index.version == self.expected_version
                    && index.state == IndexState::Clean
                    && index.dangling.is_empty()
            }
            _ => false,
        }
    }
}

/// Reads both artifacts of a directory without writing to it
pub struct Inspector {
    dir: PathBuf,
    expected: u32,
}

impl Inspector {
    pub fn new(dir: &Path, expected: u32) -> Self {
        Self {
            dir: dir.to_path_buf(),
            expected,
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(IndexStore::FILENAME)
    }

    pub fn content_path(&self) -> PathBuf {
        self.dir.join(ContentStore::FILENAME)
    }

    /// Index header on disk (`None` if there is no index artifact)
    pub fn header(&self) -> Result<Option<IndexHeader>> {
        IndexStore::new(&self.dir, self.expected).read_header()
    }

    /// Stored snapshot, whatever version it is stamped with
    pub fn snapshot(&self) -> Result<Snapshot> {
        let bytes = fs::read(self.index_path())?;
        decode_index(&bytes).map(|(_, snapshot)| snapshot)
    }

    pub fn probe_content(&self) -> Result<ProbeReport> {
        content::probe(&self.content_path())
    }

    /// Read one blob straight from the content artifact
    pub fn content_data(&self, id: ContentId) -> Result<Bytes> {
        let file = File::open(self.content_path())?;
        let file_len = file.metadata()?.len();
        let scan = content::scan(BufReader::new(&file), file_len)?;

        let location = scan
            .locations
            .get(&id)
            .copied()
            .ok_or(StorageError::ContentNotFound(id))?;

        let mut file = file;
        content::read_location(&mut file, file_len, &location)
    }

    /// Probe both artifacts and cross-check the tree against the content ids
    pub fn verify(&self) -> VerifyReport {
        let content = self.probe_content().map_err(|e| e.to_string());
        let index = self
            .summarize_index(content.as_ref().ok())
            .map_err(|e| e.to_string());

        VerifyReport {
            expected_version: self.expected,
            index,
            content,
        }
    }

    pub(crate) fn summarize_index(&self, content: Option<&ProbeReport>) -> Result<IndexSummary> {
        let bytes = fs::read(self.index_path())?;
        let (header, snapshot) = decode_index(&bytes)?;

        let refs = snapshot.root.content_ids();
        let dangling = match content {
            Some(report) => refs.iter().copied().filter(|id| id.0 >= report.next_id).collect(),
            None => Vec::new(),
        };

        Ok(IndexSummary {
            version: header.version,
            state: header.state,
            entry_counter: snapshot.entry_counter,
            change_sets: snapshot.change_list.len(),
            content_refs: refs.len(),
            dangling,
        })
    }
}
