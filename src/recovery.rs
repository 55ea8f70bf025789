//! Recovery Coordinator
//!
//! Keeps the index and the content store consistent with each other. The
//! tree references content ids, so corruption on either side resets both
//! rather than repairing one half.
//!
//! ## Policy
//! - Open, content probe failed: wipe both artifacts, keep the content
//!   store broken for the session, mark the index reset-pending
//! - Open, index payload unreadable or tree references unknown content:
//!   wipe both
//! - Content store breaks mid-session: mark the index reset-pending; the
//!   next `load` clears the index, the next open wipes both
//! - `load` finds the index unreadable: wipe both (or only the index if the
//!   content store is already broken)

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, warn};

use crate::content::ContentStore;
use crate::error::Result;
use crate::gate::OpenReport;
use crate::index::{IndexState, IndexStore};
use crate::model::Snapshot;

/// Result of the read-only half of `load`
#[derive(Debug)]
pub enum LoadOutcome {
    Ready(Snapshot),
    NeedsReset(ResetReason),
}

/// Why `load` has to write before it can answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetReason {
    /// Content store broke; the index has to drop its counters
    ContentBroken,
    IndexCorrupt(String),
}

pub struct RecoveryCoordinator {
    /// Set once the reset-pending index has been cleared this session
    pending_cleared: AtomicBool,
}

impl RecoveryCoordinator {
    pub fn new() -> Self {
        Self {
            pending_cleared: AtomicBool::new(false),
        }
    }

    /// Probe both stores after a clean version check
    pub fn validate_on_open(&self, index: &IndexStore, content: &ContentStore) -> Result<OpenReport> {
        if content.is_broken() {
            warn!("content store corrupt at open; wiping both artifacts");
            index.reset()?;
            content.reset()?;
            index.mark_reset_pending()?;
            self.pending_cleared.store(true, Ordering::SeqCst);
            return Ok(OpenReport::ContentCorrupt);
        }

        let snapshot = match index.load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "index corrupt at open; wiping both artifacts");
                index.reset()?;
                content.reset()?;
                return Ok(OpenReport::IndexCorrupt {
                    reason: e.to_string(),
                });
            }
        };

        if let Some(id) = snapshot
            .root
            .content_ids()
            .into_iter()
            .find(|id| !content.contains(*id))
        {
            warn!(%id, "index references unknown content; wiping both artifacts");
            index.reset()?;
            content.reset()?;
            return Ok(OpenReport::DanglingContent { id });
        }

        Ok(OpenReport::Clean)
    }

    /// Record that the content store broke (idempotent)
    pub fn observe_content(&self, index: &IndexStore, content: &ContentStore) {
        if !content.is_broken() {
            return;
        }
        match index.mark_reset_pending() {
            Ok(true) => warn!("content store broken; index marked for reset on next open"),
            Ok(false) => {}
            Err(e) => error!(error = %e, "failed to mark index for reset"),
        }
    }

    /// Read-only half of `load`: return the snapshot or say why a reset is needed
    pub fn check_load(&self, index: &IndexStore, content: &ContentStore) -> LoadOutcome {
        self.observe_content(index, content);

        if index.state() == IndexState::ResetPending && !self.pending_cleared.load(Ordering::SeqCst) {
            return LoadOutcome::NeedsReset(ResetReason::ContentBroken);
        }

        match index.load() {
            Ok(snapshot) => LoadOutcome::Ready(snapshot),
            Err(e) => LoadOutcome::NeedsReset(ResetReason::IndexCorrupt(e.to_string())),
        }
    }

    /// Writing half of `load`: reset what `reason` calls for and return the
    /// empty snapshot
    ///
    /// Never fails; a reset that cannot be written is logged and the empty
    /// snapshot is still returned.
    pub fn recover(&self, index: &IndexStore, content: &ContentStore, reason: ResetReason) -> Snapshot {
        match reason {
            ResetReason::ContentBroken => {
                if self.pending_cleared.swap(true, Ordering::SeqCst) {
                    // Another loader got here first and may have stored since.
                    return index.load().unwrap_or_else(|_| Snapshot::empty());
                }
                warn!("clearing index after content store breakage");
                if let Err(e) = index.clear() {
                    error!(error = %e, "failed to clear index");
                }
            }
            ResetReason::IndexCorrupt(reason) => {
                warn!(reason = %reason, "index corrupt at load; resetting");
                let result = if content.is_broken() {
                    index.clear()
                } else {
                    index.reset().and_then(|_| content.reset())
                };
                if let Err(e) = result {
                    error!(error = %e, "failed to reset storage");
                }
            }
        }
        Snapshot::empty()
    }
}

impl Default for RecoveryCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
