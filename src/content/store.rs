//! Content Store
//!
//! Append-only blob store over the `contents` artifact.
//!
//! ## State machine
//! `Healthy → Broken` is the only transition. It happens on the first
//! integrity failure (failed probe at open, failed read, failed write) and
//! lasts for the rest of the instance's life; a new open is the only way
//! back.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::{Config, SyncStrategy};
use crate::error::{Result, StorageError};
use crate::model::ContentId;

use super::probe::{read_location, scan, Location, Scan};
use super::record::{encode_record, file_header};
use super::{Content, ProbeReport, RecordKind, FILE_HEADER_SIZE, RECORD_HEADER_SIZE};

/// Health of a content store instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Healthy,
    /// Sticky until the next open
    Broken,
}

/// Counters describing the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentStats {
    pub blob_count: u64,
    pub purged_count: u64,
    pub blob_bytes: u64,
    pub next_id: u64,
    pub health: Health,
}

/// Outcome of a compaction pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionStats {
    /// Purged blobs whose bytes were dropped
    pub blobs_dropped: u64,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

/// Content-addressed blob store
///
/// ## Concurrency:
/// - `inner`: one Mutex guards the file handle, the id allocator, the
///   in-memory index and the health flag, so id allocation and the broken
///   transition are observed consistently by every thread
pub struct ContentStore {
    /// Directory holding the artifact (compaction temp files go here)
    dir: PathBuf,

    /// Path of the artifact
    path: PathBuf,

    /// Blobs longer than this are refused
    max_content_length: usize,

    sync_strategy: SyncStrategy,

    inner: Mutex<Inner>,
}

struct Inner {
    /// Read/write handle on the artifact
    file: File,

    health: Health,

    /// Locations, tombstones, next id, end of valid data
    scan: Scan,

    /// Appends since the last fsync
    unsynced: usize,
}

impl ContentStore {
    pub const FILENAME: &'static str = "contents";

    /// Open the artifact in `dir`, probing every record
    ///
    /// A failed probe does not fail the open: the store comes up `Broken`.
    /// Only errors opening the file itself propagate.
    pub fn open(dir: &Path, config: &Config) -> Result<Self> {
        let path = dir.join(Self::FILENAME);
        if !path.exists() {
            return Self::create(dir, config);
        }

        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let file_len = file.metadata()?.len();
        let (health, scan) = match scan(BufReader::new(&file), file_len) {
            Ok(scan) => {
                debug!(
                    blobs = scan.locations.len(),
                    purged = scan.purged.len(),
                    next_id = scan.next_id,
                    "content store probed"
                );
                (Health::Healthy, scan)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "content probe failed; store is broken");
                (Health::Broken, Scan::empty())
            }
        };

        Ok(Self::with_inner(dir, config, file, health, scan))
    }

    /// Create (or truncate) the artifact in `dir` as an empty store
    pub fn create(dir: &Path, config: &Config) -> Result<Self> {
        let path = dir.join(Self::FILENAME);
        let file = Self::write_fresh(&path)?;
        Ok(Self::with_inner(dir, config, file, Health::Healthy, Scan::empty()))
    }

    /// Store a blob
    ///
    /// Returns `Content::Unavailable` when the blob is over the ceiling, when
    /// the store is broken, or when the write fails (which breaks the store).
    /// No id is consumed in any of those cases.
    ///
    /// With `SyncStrategy::EveryWrite` the record is fsync'd before the id
    /// is returned. With `EveryNWrites` the id is returned once the record
    /// is written and only becomes durable at the next sync.
    pub fn store_content(&self, data: &[u8]) -> Content {
        if data.len() > self.max_content_length {
            debug!(
                len = data.len(),
                max = self.max_content_length,
                "content over size ceiling"
            );
            return Content::Unavailable;
        }

        let mut inner = self.inner.lock();
        if inner.health == Health::Broken {
            return Content::Unavailable;
        }

        let id = ContentId(inner.scan.next_id);
        match inner.append(RecordKind::Blob, id, data, self.sync_strategy) {
            Ok(location) => {
                inner.scan.locations.insert(id, location);
                inner.scan.next_id += 1;
                Content::Available {
                    id,
                    data: Bytes::copy_from_slice(data),
                }
            }
            Err(e) => {
                inner.mark_broken(&e);
                Content::Unavailable
            }
        }
    }

    /// Read a blob's bytes
    ///
    /// An id that was never allocated means the caller's index and this
    /// store disagree, which counts as an integrity failure. A purged id
    /// whose bytes were compacted away is only `ContentNotFound`.
    pub fn load_content_data(&self, id: ContentId) -> Result<Bytes> {
        let mut inner = self.inner.lock();
        if inner.health == Health::Broken {
            return Err(StorageError::ContentStoreBroken);
        }

        let location = match inner.scan.locations.get(&id).copied() {
            Some(location) => location,
            None if inner.scan.purged.contains(&id) => {
                return Err(StorageError::ContentNotFound(id));
            }
            None => {
                let e = StorageError::ContentNotFound(id);
                inner.mark_broken(&e);
                return Err(e);
            }
        };

        match inner.read_at(&location) {
            Ok(data) => Ok(data),
            Err(e) => {
                inner.mark_broken(&e);
                Err(e)
            }
        }
    }

    /// Set the purge tombstone on each id
    ///
    /// Unknown ids are ignored. Tombstones are kept in memory even when the
    /// store is broken, so `is_content_purged` stays monotone.
    pub fn purge_contents(&self, ids: &[ContentId]) {
        let mut inner = self.inner.lock();
        for &id in ids {
            if id.0 >= inner.scan.next_id {
                debug!(%id, "ignoring purge of unknown content");
                continue;
            }
            if !inner.scan.purged.insert(id) {
                continue;
            }
            if inner.health == Health::Healthy {
                if let Err(e) = inner.append(RecordKind::Purge, id, &[], self.sync_strategy) {
                    inner.mark_broken(&e);
                }
            }
        }
    }

    pub fn is_content_purged(&self, id: ContentId) -> bool {
        self.inner.lock().scan.purged.contains(&id)
    }

    /// Whether `id` was allocated by this store
    pub fn contains(&self, id: ContentId) -> bool {
        id.0 < self.inner.lock().scan.next_id
    }

    /// Wipe the artifact back to an empty store
    ///
    /// A broken instance stays broken; only the bytes on disk are reset.
    pub fn reset(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.file = Self::write_fresh(&self.path)?;
        inner.scan = Scan::empty();
        inner.unsynced = 0;
        info!(path = %self.path.display(), health = ?inner.health, "content store reset");
        Ok(())
    }

    /// Rewrite the artifact without the bytes of purged blobs
    ///
    /// Tombstones and the id allocator survive, so no id is ever handed out
    /// twice.
    pub fn compact(&self) -> Result<CompactionStats> {
        let mut inner = self.inner.lock();
        if inner.health == Health::Broken {
            return Err(StorageError::ContentStoreBroken);
        }

        let droppable = inner
            .scan
            .purged
            .iter()
            .filter(|id| inner.scan.locations.contains_key(*id))
            .count() as u64;
        let bytes_before = inner.scan.end_offset;

        if droppable == 0 {
            return Ok(CompactionStats {
                blobs_dropped: 0,
                bytes_before,
                bytes_after: bytes_before,
            });
        }

        let (file, compacted) = match inner.rewrite_compacted(&self.dir, &self.path) {
            Ok(done) => done,
            Err(e) => {
                inner.mark_broken(&e);
                return Err(e);
            }
        };

        inner.file = file;
        inner.scan = compacted;
        inner.unsynced = 0;

        let stats = CompactionStats {
            blobs_dropped: droppable,
            bytes_before,
            bytes_after: inner.scan.end_offset,
        };
        info!(
            dropped = stats.blobs_dropped,
            before = stats.bytes_before,
            after = stats.bytes_after,
            "content store compacted"
        );
        Ok(stats)
    }

    /// Flush unsynced appends to disk
    pub fn sync(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.unsynced > 0 {
            inner.file.sync_data()?;
            inner.unsynced = 0;
        }
        Ok(())
    }

    pub fn stats(&self) -> ContentStats {
        let inner = self.inner.lock();
        let report = inner.scan.report();
        ContentStats {
            blob_count: report.blob_count,
            purged_count: report.purged_count,
            blob_bytes: report.blob_bytes,
            next_id: report.next_id,
            health: inner.health,
        }
    }

    /// Re-probe the artifact on disk without touching this instance
    pub fn verify(&self) -> Result<ProbeReport> {
        let _inner = self.inner.lock();
        super::probe(&self.path)
    }

    pub fn health(&self) -> Health {
        self.inner.lock().health
    }

    pub fn is_broken(&self) -> bool {
        self.health() == Health::Broken
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends since the last fsync (for testing)
    pub fn unsynced_count(&self) -> usize {
        self.inner.lock().unsynced
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn with_inner(dir: &Path, config: &Config, file: File, health: Health, scan: Scan) -> Self {
        Self {
            dir: dir.to_path_buf(),
            path: dir.join(Self::FILENAME),
            max_content_length: config.max_content_length,
            sync_strategy: config.sync_strategy,
            inner: Mutex::new(Inner {
                file,
                health,
                scan,
                unsynced: 0,
            }),
        }
    }

    /// Truncate `path` to a bare header and fsync it
    fn write_fresh(path: &Path) -> Result<File> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(&file_header())?;
        file.sync_all()?;
        Ok(file)
    }
}

impl Inner {
    /// Append one record at the end of valid data
    fn append(
        &mut self,
        kind: RecordKind,
        id: ContentId,
        data: &[u8],
        sync_strategy: SyncStrategy,
    ) -> Result<Location> {
        let (header, record) = encode_record(kind, id, data);
        let record_offset = self.scan.end_offset;

        self.file.seek(SeekFrom::Start(record_offset))?;
        self.file.write_all(&record)?;

        self.unsynced += 1;
        let should_sync = match sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNWrites { count } => self.unsynced >= count,
        };
        if should_sync {
            self.file.sync_data()?;
            self.unsynced = 0;
        }

        self.scan.end_offset = record_offset + record.len() as u64;

        Ok(Location {
            offset: record_offset + RECORD_HEADER_SIZE as u64,
            header,
        })
    }

    /// Read and verify a blob's data
    fn read_at(&mut self, location: &Location) -> Result<Bytes> {
        let file_len = self.file.metadata()?.len();
        read_location(&mut self.file, file_len, location)
    }

    /// Copy every live blob and every tombstone into a fresh artifact
    fn rewrite_compacted(&mut self, dir: &Path, path: &Path) -> Result<(File, Scan)> {
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&file_header())?;

        let mut compacted = Scan::empty();
        for raw in 0..self.scan.next_id {
            let id = ContentId(raw);

            let (kind, data) = if self.scan.purged.contains(&id) {
                (RecordKind::Purge, Bytes::new())
            } else if let Some(location) = self.scan.locations.get(&id).copied() {
                (RecordKind::Blob, self.read_at(&location)?)
            } else {
                return Err(StorageError::content_corruption(
                    Some(id),
                    "Allocated id has neither blob nor tombstone",
                ));
            };

            let (header, record) = encode_record(kind, id, &data);
            tmp.write_all(&record)?;

            match kind {
                RecordKind::Blob => {
                    compacted.locations.insert(
                        id,
                        Location {
                            offset: compacted.end_offset + RECORD_HEADER_SIZE as u64,
                            header,
                        },
                    );
                }
                RecordKind::Purge => {
                    compacted.purged.insert(id);
                }
            }
            compacted.next_id = raw + 1;
            compacted.end_offset += record.len() as u64;
        }

        tmp.as_file().sync_all()?;
        let file = tmp.persist(path).map_err(|e| StorageError::Io(e.error))?;
        debug_assert!(compacted.end_offset >= FILE_HEADER_SIZE);

        Ok((file, compacted))
    }

    fn mark_broken(&mut self, cause: &StorageError) {
        if self.health == Health::Healthy {
            warn!(error = %cause, "content store marked broken");
            self.health = Health::Broken;
        }
    }
}
