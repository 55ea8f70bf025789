//! Configuration for localvcs-store
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, StorageError};

/// Schema generation stamped into the index artifact.
///
/// Bump this whenever the snapshot payload changes shape; opening an older
/// directory then wipes it instead of failing to decode it.
pub const SCHEMA_VERSION: u32 = 1;

/// Largest blob accepted by `store_content` (1 MiB)
pub const MAX_CONTENT_LENGTH: usize = 1024 * 1024;

/// Main configuration for a storage instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding both artifacts
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── storage          (index: version stamp + snapshot)
    ///     └── contents         (content records + purge tombstones)
    pub data_dir: PathBuf,

    /// Expected schema version; a different stamp on disk wipes the directory
    pub version: u32,

    // -------------------------------------------------------------------------
    // Content Configuration
    // -------------------------------------------------------------------------
    /// Blobs longer than this come back as `Content::Unavailable`
    pub max_content_length: usize,

    /// Sync strategy: how often to fsync the content artifact
    pub sync_strategy: SyncStrategy,
}

/// Content artifact sync strategy
///
/// Only `EveryWrite` guarantees that an id handed out by `store_content`
/// names bytes already on stable storage. `EveryNWrites` is an opt-in
/// trade: up to `count - 1` returned ids can be lost on power failure
/// (the next open's probe then sees a shorter artifact and allocates those
/// ids again).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every write before returning the id (default)
    EveryWrite,

    /// fsync after N unsynced writes; ids of unsynced writes are not durable
    EveryNWrites { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./localvcs_data"),
            version: SCHEMA_VERSION,
            max_content_length: MAX_CONTENT_LENGTH,
            sync_strategy: SyncStrategy::EveryWrite,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the on-disk format cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.max_content_length == 0 {
            return Err(StorageError::Config(
                "max_content_length must be greater than zero".to_string(),
            ));
        }
        if self.max_content_length > u32::MAX as usize {
            return Err(StorageError::Config(format!(
                "max_content_length {} exceeds record limit {}",
                self.max_content_length,
                u32::MAX
            )));
        }
        if let SyncStrategy::EveryNWrites { count: 0 } = self.sync_strategy {
            return Err(StorageError::Config(
                "sync_strategy count must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (holds both artifacts)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the expected schema version
    pub fn version(mut self, version: u32) -> Self {
        self.config.version = version;
        self
    }

    /// Set the content size ceiling (in bytes)
    pub fn max_content_length(mut self, len: usize) -> Self {
        self.config.max_content_length = len;
        self
    }

    /// Set the content sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
