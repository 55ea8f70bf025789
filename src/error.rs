//! Error types for localvcs-store
//!
//! Provides a unified error type for all operations.

use std::io;

use thiserror::Error;

use crate::model::ContentId;

/// Result type alias using StorageError
pub type Result<T> = std::result::Result<T, StorageError>;

/// Unified error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // -------------------------------------------------------------------------
    // Index Errors
    // -------------------------------------------------------------------------
    #[error("Index corruption detected: {0}")]
    IndexCorruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Content Errors
    // -------------------------------------------------------------------------
    #[error("Content not found: {0}")]
    ContentNotFound(ContentId),

    #[error("Content corruption detected: {reason}")]
    ContentCorruption {
        id: Option<ContentId>,
        reason: String,
    },

    #[error("Content store is broken for this session")]
    ContentStoreBroken,

    // -------------------------------------------------------------------------
    // Snapshot Errors
    // -------------------------------------------------------------------------
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Storage is closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Whether this error belongs to the I/O family surfaced by content reads
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            StorageError::Io(_)
                | StorageError::ContentNotFound(_)
                | StorageError::ContentCorruption { .. }
                | StorageError::ContentStoreBroken
        )
    }

    pub(crate) fn content_corruption(id: Option<ContentId>, reason: impl Into<String>) -> Self {
        StorageError::ContentCorruption {
            id,
            reason: reason.into(),
        }
    }
}

impl From<bincode::Error> for StorageError {
    fn from(e: bincode::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

impl From<StorageError> for io::Error {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Io(inner) => inner,
            StorageError::ContentNotFound(_) => io::Error::new(io::ErrorKind::NotFound, e),
            StorageError::ContentCorruption { .. }
            | StorageError::IndexCorruption(_)
            | StorageError::Serialization(_)
            | StorageError::InvalidSnapshot(_) => io::Error::new(io::ErrorKind::InvalidData, e),
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}
