//! Version Gate
//!
//! Owns the open sequence: create the directory, read the version stamp,
//! and either hand both stores to the recovery coordinator or wipe the
//! directory and start from an empty generation.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{const_mutex, Mutex};
use tracing::{debug, info};

use crate::config::Config;
use crate::content::ContentStore;
use crate::error::{Result, StorageError};
use crate::index::{IndexState, IndexStore};
use crate::model::ContentId;
use crate::recovery::RecoveryCoordinator;

/// Serializes every open sequence in the process, so a reset can never
/// interleave with another open's reads of the same directory
static OPEN_LOCK: Mutex<()> = const_mutex(());

/// What happened while opening
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenReport {
    /// Stamp matched and both artifacts passed the probe
    Clean,

    /// No index artifact existed; a fresh generation was created
    Initialized,

    /// Stamp on disk differs from the expected version
    VersionMismatch { found: u32, expected: u32 },

    /// A previous session left the reset-pending mark
    ResetPending,

    /// Index header or payload could not be read
    IndexCorrupt { reason: String },

    /// Content artifact failed its probe; content stays broken this session
    ContentCorrupt,

    /// The tree references a content id the content store never allocated
    DanglingContent { id: ContentId },
}

impl OpenReport {
    /// Whether the directory was wiped during open
    pub fn was_reset(&self) -> bool {
        !matches!(self, OpenReport::Clean)
    }
}

/// Decides between trusting the directory and wiping it
pub struct VersionGate {
    dir: PathBuf,
    expected: u32,
}

impl VersionGate {
    pub fn new(dir: &Path, expected: u32) -> Self {
        Self {
            dir: dir.to_path_buf(),
            expected,
        }
    }

    /// Run the whole open sequence
    ///
    /// Steps:
    /// 1. Create the directory (and missing parents)
    /// 2. Read the stamp from the index header
    /// 3. Mismatch / absent / unreadable / reset-pending → wipe both artifacts
    /// 4. Otherwise open the content store and let the coordinator probe
    pub fn open(
        &self,
        config: &Config,
        coordinator: &RecoveryCoordinator,
    ) -> Result<(IndexStore, ContentStore, OpenReport)> {
        let _open_guard = OPEN_LOCK.lock();

        fs::create_dir_all(&self.dir)?;
        let index = IndexStore::new(&self.dir, self.expected);

        let decision = self.check(&index)?;
        if decision.was_reset() {
            info!(dir = %self.dir.display(), reason = ?decision, "resetting storage");
            let content = self.reset(&index, config)?;
            return Ok((index, content, decision));
        }

        let content = ContentStore::open(&self.dir, config)?;
        let report = coordinator.validate_on_open(&index, &content)?;
        debug!(dir = %self.dir.display(), report = ?report, "storage opened");

        Ok((index, content, report))
    }

    /// Compare the stamp on disk with the expected version
    pub fn check(&self, index: &IndexStore) -> Result<OpenReport> {
        let header = match index.read_header() {
            Ok(Some(header)) => header,
            Ok(None) => return Ok(OpenReport::Initialized),
            Err(StorageError::IndexCorruption(reason)) => {
                return Ok(OpenReport::IndexCorrupt { reason })
            }
            Err(e) => return Err(e),
        };

        if header.version != self.expected {
            return Ok(OpenReport::VersionMismatch {
                found: header.version,
                expected: self.expected,
            });
        }

        if header.state == IndexState::ResetPending {
            return Ok(OpenReport::ResetPending);
        }

        Ok(OpenReport::Clean)
    }

    /// Wipe both artifacts and restamp the index
    pub fn reset(&self, index: &IndexStore, config: &Config) -> Result<ContentStore> {
        index.reset()?;
        ContentStore::create(&self.dir, config)
    }

    pub fn expected_version(&self) -> u32 {
        self.expected
    }
}
