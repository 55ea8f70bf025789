//! Index Store
//!
//! Owns the `storage` artifact and serializes writers to it.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{Result, StorageError};
use crate::model::Snapshot;

use super::{decode_header, decode_index, encode_index, IndexHeader, IndexState, HEADER_SIZE};

/// Whole-snapshot store for the index artifact
///
/// ## Concurrency:
/// - `state`: Mutex held for the whole of every write, so replacements are
///   serialized and the state byte written always matches `state()`
/// - Reads take no lock; the rename makes each replacement atomic
pub struct IndexStore {
    /// Directory holding the artifact (temp files are created here)
    dir: PathBuf,

    /// Path of the artifact
    path: PathBuf,

    /// Version stamp written with every snapshot
    version: u32,

    /// State byte written with every snapshot
    state: Mutex<IndexState>,
}

impl IndexStore {
    pub const FILENAME: &'static str = "storage";

    /// Bind to the index artifact in `dir` (no I/O)
    pub fn new(dir: &Path, version: u32) -> Self {
        Self {
            dir: dir.to_path_buf(),
            path: dir.join(Self::FILENAME),
            version,
            state: Mutex::new(IndexState::Clean),
        }
    }

    /// Read the header of the artifact on disk
    ///
    /// Returns:
    /// - `Ok(None)`: no artifact yet
    /// - `Ok(Some(header))`: header parsed
    /// - `Err(IndexCorruption)`: artifact present but unreadable
    pub fn read_header(&self) -> Result<Option<IndexHeader>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let header_len = bytes.len().min(HEADER_SIZE);
        decode_header(&bytes[..header_len]).map(Some)
    }

    /// Load and fully verify the stored snapshot
    pub fn load(&self) -> Result<Snapshot> {
        let bytes = fs::read(&self.path)?;
        let (header, snapshot) = decode_index(&bytes)?;

        if header.version != self.version {
            return Err(StorageError::IndexCorruption(format!(
                "Version stamp changed underneath: expected {}, found {}",
                self.version, header.version
            )));
        }

        debug!(
            entry_counter = snapshot.entry_counter,
            change_sets = snapshot.change_list.len(),
            "index loaded"
        );
        Ok(snapshot)
    }

    /// Replace the stored snapshot
    pub fn store(&self, snapshot: &Snapshot) -> Result<()> {
        snapshot.validate()?;

        let state = self.state.lock();
        self.write_locked(snapshot, *state)?;

        debug!(
            entry_counter = snapshot.entry_counter,
            change_sets = snapshot.change_list.len(),
            "index stored"
        );
        Ok(())
    }

    /// Reinitialize to the empty snapshot with a `Clean` state
    pub fn reset(&self) -> Result<()> {
        let mut state = self.state.lock();
        *state = IndexState::Clean;
        self.write_locked(&Snapshot::empty(), IndexState::Clean)
    }

    /// Replace the stored snapshot with the empty one, keeping the state
    pub fn clear(&self) -> Result<()> {
        let state = self.state.lock();
        self.write_locked(&Snapshot::empty(), *state)
    }

    /// Mark the artifact so the next open wipes the whole directory
    ///
    /// Returns `true` if this call made the transition.
    pub fn mark_reset_pending(&self) -> Result<bool> {
        let mut state = self.state.lock();
        if *state == IndexState::ResetPending {
            return Ok(false);
        }

        let snapshot = match self.load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "index unreadable while marking reset; writing empty snapshot");
                Snapshot::empty()
            }
        };
        self.write_locked(&snapshot, IndexState::ResetPending)?;
        *state = IndexState::ResetPending;
        Ok(true)
    }

    /// Current state byte (as this instance writes it)
    pub fn state(&self) -> IndexState {
        *self.state.lock()
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Write temp file, fsync, rename over the artifact (caller holds `state`)
    fn write_locked(&self, snapshot: &Snapshot, state: IndexState) -> Result<()> {
        let bytes = encode_index(snapshot, self.version, state)?;

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StorageError::Io(e.error))?;

        Ok(())
    }
}
