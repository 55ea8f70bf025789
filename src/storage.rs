//! Storage Module
//!
//! The facade the VCS engine talks to: one open/store/load/close surface
//! over the version gate, both stores and the recovery coordinator.
//!
//! ## Responsibilities
//! - Run the open sequence (directory, stamp, probes, resets)
//! - Route snapshot calls to the index, blob calls to the content store
//! - Make `load` total
//! - Make every call after `close` fail with `StorageError::Closed`

use std::path::Path;

use bytes::Bytes;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::content::{CompactionStats, Content, ContentStats, ContentStore};
use crate::error::{Result, StorageError};
use crate::gate::{OpenReport, VersionGate};
use crate::index::{IndexState, IndexStore};
use crate::inspector::{Inspector, VerifyReport};
use crate::model::{ContentId, Snapshot};
use crate::recovery::{LoadOutcome, RecoveryCoordinator};

/// Aggregate counters for both stores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    pub version: u32,
    pub index_state: IndexState,
    pub content: ContentStats,
}

/// Everything that lives between open and close
struct Stores {
    index: IndexStore,
    content: ContentStore,
    coordinator: RecoveryCoordinator,
}

/// Persistent storage for a local VCS log
///
/// ## Concurrency Model
///
/// - Every call holds a read guard on `stores`, so calls run concurrently;
///   each store serializes its own writers internally
/// - `load` takes an upgradable guard and upgrades to exclusive only when
///   it has to reset, so no reader sees a half-reset directory
/// - `close` takes the write guard: it waits for in-flight calls, then
///   drops the handles for good
pub struct LocalVcsStorage {
    config: Config,

    /// Decision taken during open
    report: OpenReport,

    /// `None` once closed
    stores: RwLock<Option<Stores>>,
}

impl LocalVcsStorage {
    /// Open or create storage with the given config
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let coordinator = RecoveryCoordinator::new();
        let gate = VersionGate::new(&config.data_dir, config.version);
        let (index, content, report) = gate.open(&config, &coordinator)?;

        info!(
            dir = %config.data_dir.display(),
            version = config.version,
            report = ?report,
            "local vcs storage opened"
        );

        Ok(Self {
            config,
            report,
            stores: RwLock::new(Some(Stores {
                index,
                content,
                coordinator,
            })),
        })
    }

    /// Open with a path (default config otherwise)
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Open with a path and an explicit schema version
    pub fn open_with_version(path: &Path, version: u32) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).version(version).build())
    }

    // =========================================================================
    // Snapshot Operations
    // =========================================================================

    /// Replace the stored snapshot
    pub fn store(&self, snapshot: &Snapshot) -> Result<()> {
        let guard = self.stores.read();
        let stores = guard.as_ref().ok_or(StorageError::Closed)?;
        stores.index.store(snapshot)
    }

    /// Load the stored snapshot
    ///
    /// Never fails on corruption: an unreadable index resets the storage
    /// and the empty snapshot comes back. The only error is `Closed`.
    pub fn load(&self) -> Result<Snapshot> {
        let guard = self.stores.upgradable_read();
        let stores = guard.as_ref().ok_or(StorageError::Closed)?;

        match stores.coordinator.check_load(&stores.index, &stores.content) {
            LoadOutcome::Ready(snapshot) => Ok(snapshot),
            LoadOutcome::NeedsReset(reason) => {
                let guard = RwLockUpgradableReadGuard::upgrade(guard);
                let stores = guard.as_ref().ok_or(StorageError::Closed)?;
                Ok(stores
                    .coordinator
                    .recover(&stores.index, &stores.content, reason))
            }
        }
    }

    // =========================================================================
    // Content Operations
    // =========================================================================

    /// Store a blob; oversize blobs and a broken store give `Content::Unavailable`
    pub fn store_content(&self, data: &[u8]) -> Result<Content> {
        self.with_content(|content| Ok(content.store_content(data)))
    }

    /// Read a blob by id
    ///
    /// Errors are all in the I/O family (`StorageError::is_io`). After the
    /// first integrity failure every later read fails too.
    pub fn load_content_data(&self, id: ContentId) -> Result<Bytes> {
        self.with_content(|content| content.load_content_data(id))
    }

    /// Set the purge tombstone on each available content
    pub fn purge_contents(&self, contents: &[Content]) -> Result<()> {
        let ids: Vec<ContentId> = contents.iter().filter_map(Content::id).collect();
        self.with_content(|content| {
            content.purge_contents(&ids);
            Ok(())
        })
    }

    /// Whether `content` carries a purge tombstone (never for `Unavailable`)
    pub fn is_content_purged(&self, content: &Content) -> Result<bool> {
        self.with_content(|store| {
            Ok(content
                .id()
                .map_or(false, |id| store.is_content_purged(id)))
        })
    }

    /// Drop the bytes of purged blobs from the content artifact
    pub fn compact_contents(&self) -> Result<CompactionStats> {
        self.with_content(ContentStore::compact)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn stats(&self) -> Result<StorageStats> {
        let guard = self.stores.read();
        let stores = guard.as_ref().ok_or(StorageError::Closed)?;
        Ok(StorageStats {
            version: stores.index.version(),
            index_state: stores.index.state(),
            content: stores.content.stats(),
        })
    }

    /// Re-read both artifacts from disk without changing any state
    ///
    /// A content store that broke this session fails the content half even
    /// when the bytes on disk were already reset during open.
    pub fn verify(&self) -> Result<VerifyReport> {
        let guard = self.stores.read();
        let stores = guard.as_ref().ok_or(StorageError::Closed)?;

        let content = if stores.content.is_broken() {
            Err(StorageError::ContentStoreBroken.to_string())
        } else {
            stores.content.verify().map_err(|e| e.to_string())
        };
        let index = Inspector::new(&self.config.data_dir, self.config.version)
            .summarize_index(content.as_ref().ok())
            .map_err(|e| e.to_string());

        Ok(VerifyReport {
            expected_version: self.config.version,
            index,
            content,
        })
    }

    /// What the open sequence decided
    pub fn open_report(&self) -> &OpenReport {
        &self.report
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Flush pending writes and release both artifacts
    ///
    /// Waits for in-flight calls. Every later call, including a second
    /// `close`, fails with `StorageError::Closed`.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.stores.write();
        let stores = guard.take().ok_or(StorageError::Closed)?;
        stores.content.sync()?;
        debug!(dir = %self.config.data_dir.display(), "local vcs storage closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.stores.read().is_none()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Run a content operation, then let the coordinator see whether it
    /// broke the store
    fn with_content<T>(&self, op: impl FnOnce(&ContentStore) -> Result<T>) -> Result<T> {
        let guard = self.stores.read();
        let stores = guard.as_ref().ok_or(StorageError::Closed)?;
        let result = op(&stores.content);
        stores.coordinator.observe_content(&stores.index, &stores.content);
        result
    }
}

impl Drop for LocalVcsStorage {
    fn drop(&mut self) {
        if let Some(stores) = self.stores.get_mut().take() {
            if let Err(e) = stores.content.sync() {
                error!(error = %e, "failed to sync content store on drop");
            }
        }
    }
}
