//! Cheap, cloneable entry point into a running sync engine.

use super::types::SyncTrigger;
use crate::storage::EntityKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Trigger channel capacity. Extra triggers are dropped; one queued
/// trigger is enough to get a pass.
pub(crate) const TRIGGER_CAPACITY: usize = 32;

/// Handle used by domain services and the host app to poke the engine.
///
/// Every method is non-blocking and works with or without a runtime.
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::Sender<SyncTrigger>,
    online: Arc<AtomicBool>,
}

impl SyncHandle {
    pub(crate) fn new(tx: mpsc::Sender<SyncTrigger>, online: Arc<AtomicBool>) -> Self {
        Self { tx, online }
    }

    /// Queue a pass request.
    pub fn request(&self, trigger: SyncTrigger) {
        match self.tx.try_send(trigger) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::trace!("Sync trigger queue full, dropping {:?}", trigger);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Sync engine gone, dropping {:?}", trigger);
            }
        }
    }

    /// A domain service committed a record locally.
    pub fn record_written(&self, kind: EntityKind) {
        self.request(SyncTrigger::LocalWrite(kind));
    }

    /// Report connectivity. Going from offline to online requests a pass.
    pub fn set_online(&self, online: bool) {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if online && !was_online {
            tracing::info!("Connectivity restored");
            self.request(SyncTrigger::ConnectivityRestored);
        } else if !online && was_online {
            tracing::info!("Connectivity lost");
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn app_foregrounded(&self) {
        self.request(SyncTrigger::Foreground);
    }

    /// Queue an explicit pass.
    pub fn force_sync(&self) {
        self.request(SyncTrigger::Force);
    }
}
