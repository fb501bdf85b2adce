//! Sync engine type definitions.

use crate::storage::EntityKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Why a pass was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncTrigger {
    /// The device came back online
    ConnectivityRestored,
    /// Periodic interval elapsed
    Timer,
    /// The app returned to the foreground
    Foreground,
    /// Explicit user request
    Force,
    /// A domain service wrote a record
    LocalWrite(EntityKind),
}

/// Engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    Idle,
    Syncing,
}

/// Why a pass did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    Offline,
    AlreadySyncing,
}

/// One entry in the rolling error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncErrorNote {
    pub at: DateTime<Utc>,
    pub kind: EntityKind,
    pub record_id: Option<Uuid>,
    pub message: String,
}

/// Summary of one completed pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub trigger: SyncTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Records confirmed by the remote and marked synced
    pub pushed: usize,
    /// Records the remote accepted but that changed locally mid-push
    pub superseded: usize,
    /// Records left unsynced after an error
    pub failed: usize,
    pub media_uploaded: usize,
    pub media_failed: usize,
    /// Whether `stop()` cut the pass short
    pub interrupted: bool,
}

impl SyncReport {
    pub(crate) fn new(trigger: SyncTrigger, started_at: DateTime<Utc>) -> Self {
        Self {
            trigger,
            started_at,
            finished_at: started_at,
            pushed: 0,
            superseded: 0,
            failed: 0,
            media_uploaded: 0,
            media_failed: 0,
            interrupted: false,
        }
    }

    /// Whether every attempted record and blob went through.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.media_failed == 0 && !self.interrupted
    }
}

/// Result of a pass request.
#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    Completed(SyncReport),
    Skipped(SkipReason),
}

impl PassOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            PassOutcome::Completed(report) => Some(report),
            PassOutcome::Skipped(_) => None,
        }
    }
}

/// Events published on the engine's broadcast channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    PassStarted(SyncTrigger),
    PassCompleted(SyncReport),
    PassSkipped {
        trigger: SyncTrigger,
        reason: SkipReason,
    },
}

/// Snapshot returned by `SyncEngine::status`.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    pub state: SyncState,
    pub online: bool,
    /// Whether the background loop is running
    pub running: bool,
    /// Unsynced records per collection
    pub pending: HashMap<EntityKind, u64>,
    /// Media blobs waiting for upload
    pub pending_media: u64,
    pub last_pass_at: Option<DateTime<Utc>>,
    pub last_report: Option<SyncReport>,
    /// Oldest first
    pub recent_errors: Vec<SyncErrorNote>,
}

impl SyncStatus {
    /// Unsynced records across all collections.
    pub fn total_pending(&self) -> u64 {
        self.pending.values().sum()
    }
}
