//! Background sync engine.
//!
//! Pushes unsynced local records to the remote store, oldest first, one
//! collection at a time, then uploads pending media. At most one pass runs at
//! a time. Remote failures leave records unsynced and land in a bounded
//! error log; they never reach the code that wrote the record.

use super::handle::{SyncHandle, TRIGGER_CAPACITY};
use super::remote::{MediaStore, QueryFilter, RemoteError, RemoteStore};
use super::types::{
    PassOutcome, SkipReason, SyncErrorNote, SyncEvent, SyncReport, SyncState, SyncStatus,
    SyncTrigger,
};
use crate::account::UserAggregate;
use crate::activities::ActivityRecord;
use crate::assessments::AssessmentRecord;
use crate::clock::{Clock, SystemClock};
use crate::progress::{AchievementUnlock, ChallengeProgress};
use crate::rewards::Redemption;
use crate::storage::{EntityKind, LocalStore, MediaBlob, Record, StorageError, SyncSettings};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

/// Event channel capacity.
const EVENT_CAPACITY: usize = 64;

/// Lifecycle value while the loop is stopped.
const STOPPED: u64 = 0;

#[derive(Default)]
struct PassLog {
    recent_errors: VecDeque<SyncErrorNote>,
    last_pass_at: Option<chrono::DateTime<chrono::Utc>>,
    last_report: Option<SyncReport>,
}

struct Shared<R, M> {
    store: LocalStore,
    remote: R,
    media: M,
    settings: SyncSettings,
    clock: Arc<dyn Clock>,
    online: Arc<AtomicBool>,
    syncing: AtomicBool,
    /// Id of the current loop run, `STOPPED` when not running
    lifecycle: watch::Sender<u64>,
    next_run: AtomicU64,
    log: Mutex<PassLog>,
    events: broadcast::Sender<SyncEvent>,
}

/// Clears the syncing flag when a pass ends, however it ends.
struct PassGuard<'a>(&'a AtomicBool);

impl<'a> PassGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| PassGuard(flag))
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Background reconciliation between the local store and the remote.
///
/// Nothing runs until [`start`](Self::start) is called.
pub struct SyncEngine<R: RemoteStore, M: MediaStore> {
    shared: Arc<Shared<R, M>>,
    handle: SyncHandle,
    triggers: Arc<tokio::sync::Mutex<mpsc::Receiver<SyncTrigger>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<R: RemoteStore, M: MediaStore> SyncEngine<R, M> {
    pub fn new(store: LocalStore, remote: R, media: M, settings: SyncSettings) -> Self {
        Self::with_clock(store, remote, media, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: LocalStore,
        remote: R,
        media: M,
        settings: SyncSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_CAPACITY);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (lifecycle, _) = watch::channel(STOPPED);
        let online = Arc::new(AtomicBool::new(true));

        let shared = Shared {
            store,
            remote,
            media,
            settings,
            clock,
            online: Arc::clone(&online),
            syncing: AtomicBool::new(false),
            lifecycle,
            next_run: AtomicU64::new(STOPPED),
            log: Mutex::new(PassLog::default()),
            events,
        };

        Self {
            shared: Arc::new(shared),
            handle: SyncHandle::new(trigger_tx, online),
            triggers: Arc::new(tokio::sync::Mutex::new(trigger_rx)),
            task: Mutex::new(None),
        }
    }

    /// Handle for services and connectivity callbacks.
    pub fn handle(&self) -> SyncHandle {
        self.handle.clone()
    }

    /// Subscribe to pass events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.shared.events.subscribe()
    }

    pub fn remote(&self) -> &R {
        &self.shared.remote
    }

    pub fn media(&self) -> &M {
        &self.shared.media
    }

    pub fn is_running(&self) -> bool {
        *self.shared.lifecycle.borrow() != STOPPED
    }

    /// Start the background loop on the current tokio runtime.
    ///
    /// The first interval tick fires right away, so starting also runs a pass.
    pub fn start(&self) -> Result<(), SyncError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SyncError::NoRuntime)?;

        let run = self.shared.next_run.fetch_add(1, Ordering::SeqCst) + 1;
        let started = self.shared.lifecycle.send_if_modified(|current| {
            if *current == STOPPED {
                *current = run;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(SyncError::AlreadyRunning);
        }

        let task = runtime.spawn(run_loop(
            Arc::clone(&self.shared),
            Arc::clone(&self.triggers),
            run,
        ));
        if let Ok(mut slot) = self.task.lock() {
            *slot = Some(task);
        }

        tracing::info!(
            "Sync engine started (interval {:?})",
            self.shared.settings.interval()
        );
        Ok(())
    }

    /// Stop the background loop.
    ///
    /// No new passes start. A loop-driven pass in flight finishes the record
    /// step it is awaiting and then ends.
    pub fn stop(&self) {
        if self.shared.lifecycle.send_replace(STOPPED) != STOPPED {
            tracing::info!("Sync engine stopping");
        }
    }

    /// Stop and wait for the loop task to exit.
    pub async fn shutdown(&self) {
        self.stop();
        let task = self.task.lock().ok().and_then(|mut slot| slot.take());
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!("Sync loop ended abnormally: {}", e);
            }
        }
    }

    /// Run one pass now, bypassing the loop.
    ///
    /// Skips if offline or if a pass is already running.
    pub async fn force_sync(&self) -> PassOutcome {
        self.shared.run_pass(SyncTrigger::Force, None).await
    }

    /// Current state, pending counts and recent errors.
    pub fn status(&self) -> Result<SyncStatus, SyncError> {
        let store = &self.shared.store;
        let mut pending = HashMap::new();
        for kind in EntityKind::ALL {
            pending.insert(kind, store.count_unsynced(kind)?);
        }
        let pending_media = store.count_pending_media()?;

        let state = if self.shared.syncing.load(Ordering::SeqCst) {
            SyncState::Syncing
        } else {
            SyncState::Idle
        };

        let log = self.shared.log();
        Ok(SyncStatus {
            state,
            online: self.handle.is_online(),
            running: self.is_running(),
            pending,
            pending_media,
            last_pass_at: log.last_pass_at,
            last_report: log.last_report.clone(),
            recent_errors: log.recent_errors.iter().cloned().collect(),
        })
    }

    /// Remote copies of one owner's records in a collection.
    ///
    /// Documents that do not decode as `T` are skipped with a warning.
    pub async fn fetch_remote<T: Record>(&self, owner_id: Uuid) -> Result<Vec<T>, SyncError> {
        let documents = self
            .shared
            .remote
            .query(
                T::KIND.remote_collection(),
                &[QueryFilter::eq("ownerId", owner_id)],
            )
            .await?;

        let now = self.shared.clock.now();
        let mut records = Vec::with_capacity(documents.len());
        for document in documents {
            match serde_json::from_value::<T>(document) {
                Ok(mut record) => {
                    let envelope = record.envelope_mut();
                    envelope.synced = true;
                    envelope.synced_at = Some(now);
                    records.push(record);
                }
                Err(e) => tracing::warn!("Skipping undecodable {} document: {}", T::KIND, e),
            }
        }
        Ok(records)
    }

    /// Pull an owner's remote records that are missing locally.
    ///
    /// Local records are never overwritten, except a user aggregate that is
    /// still untouched (as created by signing in on a fresh device). Returns
    /// how many were written per collection.
    pub async fn restore_owner(
        &self,
        owner_id: Uuid,
    ) -> Result<HashMap<EntityKind, usize>, SyncError> {
        let mut restored = HashMap::new();
        for kind in EntityKind::ALL {
            let count = match kind {
                EntityKind::Users => self.restore_user(owner_id).await?,
                EntityKind::Activities => {
                    self.restore_collection::<ActivityRecord>(owner_id).await?
                }
                EntityKind::Assessments => {
                    self.restore_collection::<AssessmentRecord>(owner_id).await?
                }
                EntityKind::ChallengeProgress => {
                    self.restore_collection::<ChallengeProgress>(owner_id).await?
                }
                EntityKind::Achievements => {
                    self.restore_collection::<AchievementUnlock>(owner_id).await?
                }
                EntityKind::Redemptions => self.restore_collection::<Redemption>(owner_id).await?,
            };
            restored.insert(kind, count);
        }

        tracing::info!(
            "Restored {} remote records for {}",
            restored.values().sum::<usize>(),
            owner_id
        );
        Ok(restored)
    }

    async fn restore_user(&self, owner_id: Uuid) -> Result<usize, SyncError> {
        let store = &self.shared.store;
        let mut written = 0;
        for remote in self.fetch_remote::<UserAggregate>(owner_id).await? {
            match store.get::<UserAggregate>(remote.id())? {
                None => store.create(&remote)?,
                Some(local) if local.is_untouched() => {
                    tracing::debug!("Replacing empty local aggregate for {}", owner_id);
                    store.update(&remote)?;
                }
                Some(_) => continue,
            }
            written += 1;
        }
        Ok(written)
    }

    async fn restore_collection<T: Record>(&self, owner_id: Uuid) -> Result<usize, SyncError> {
        let records = self.fetch_remote::<T>(owner_id).await?;
        let mut inserted = 0;
        for record in &records {
            match self.shared.store.create(record) {
                Ok(()) => inserted += 1,
                Err(StorageError::DuplicateId { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(inserted)
    }
}

impl<R: RemoteStore, M: MediaStore> Drop for SyncEngine<R, M> {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_loop<R: RemoteStore, M: MediaStore>(
    shared: Arc<Shared<R, M>>,
    triggers: Arc<tokio::sync::Mutex<mpsc::Receiver<SyncTrigger>>>,
    run: u64,
) {
    // A previous run may still be finishing its last pass.
    let mut triggers = triggers.lock().await;
    let mut lifecycle = shared.lifecycle.subscribe();

    let mut ticker = tokio::time::interval(shared.settings.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *lifecycle.borrow_and_update() != run {
            break;
        }

        let trigger = tokio::select! {
            _ = ticker.tick() => SyncTrigger::Timer,
            received = triggers.recv() => match received {
                Some(trigger) => trigger,
                None => break,
            },
            changed = lifecycle.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        };

        shared.run_pass(trigger, Some(run)).await;

        // Anything queued during the pass is covered by it.
        while triggers.try_recv().is_ok() {}
    }

    tracing::info!("Sync loop stopped");
}

impl<R: RemoteStore, M: MediaStore> Shared<R, M> {
    fn log(&self) -> MutexGuard<'_, PassLog> {
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Whether `stop()` (or a restart) ended the loop run this pass belongs to.
    fn interrupted(&self, run: Option<u64>) -> bool {
        run.is_some_and(|run| *self.lifecycle.borrow() != run)
    }

    fn note(&self, kind: EntityKind, record_id: Option<Uuid>, message: String) {
        let capacity = self.settings.error_log_capacity.max(1);
        let mut log = self.log();
        while log.recent_errors.len() >= capacity {
            log.recent_errors.pop_front();
        }
        log.recent_errors.push_back(SyncErrorNote {
            at: self.clock.now(),
            kind,
            record_id,
            message,
        });
    }

    async fn run_pass(&self, trigger: SyncTrigger, run: Option<u64>) -> PassOutcome {
        if !self.online.load(Ordering::SeqCst) {
            tracing::debug!("Offline, skipping sync pass ({:?})", trigger);
            return self.skip(trigger, SkipReason::Offline);
        }

        let Some(_guard) = PassGuard::acquire(&self.syncing) else {
            tracing::debug!("Sync pass already running, ignoring {:?}", trigger);
            return self.skip(trigger, SkipReason::AlreadySyncing);
        };

        self.emit(SyncEvent::PassStarted(trigger));
        let mut report = SyncReport::new(trigger, self.clock.now());

        for kind in EntityKind::ALL {
            let result = match kind {
                EntityKind::Users => self.push_collection::<UserAggregate>(&mut report, run).await,
                EntityKind::Activities => {
                    self.push_collection::<ActivityRecord>(&mut report, run).await
                }
                EntityKind::Assessments => {
                    self.push_collection::<AssessmentRecord>(&mut report, run)
                        .await
                }
                EntityKind::ChallengeProgress => {
                    self.push_collection::<ChallengeProgress>(&mut report, run)
                        .await
                }
                EntityKind::Achievements => {
                    self.push_collection::<AchievementUnlock>(&mut report, run)
                        .await
                }
                EntityKind::Redemptions => {
                    self.push_collection::<Redemption>(&mut report, run).await
                }
            };

            if let Err(e) = result {
                tracing::error!("Reading unsynced {} failed: {}", kind, e);
                self.note(kind, None, e.to_string());
            }
            if report.interrupted {
                break;
            }
        }

        if !report.interrupted {
            if let Err(e) = self.upload_media(&mut report, run).await {
                tracing::error!("Reading pending media failed: {}", e);
                self.note(EntityKind::Activities, None, e.to_string());
            }
        }

        report.finished_at = self.clock.now();
        {
            let mut log = self.log();
            log.last_pass_at = Some(report.finished_at);
            log.last_report = Some(report.clone());
        }

        tracing::info!(
            "Sync pass done ({:?}): {} pushed, {} failed, {} media uploaded{}",
            trigger,
            report.pushed,
            report.failed,
            report.media_uploaded,
            if report.interrupted { ", interrupted" } else { "" }
        );
        self.emit(SyncEvent::PassCompleted(report.clone()));
        PassOutcome::Completed(report)
    }

    fn skip(&self, trigger: SyncTrigger, reason: SkipReason) -> PassOutcome {
        self.emit(SyncEvent::PassSkipped { trigger, reason });
        PassOutcome::Skipped(reason)
    }

    async fn push_collection<T: Record>(
        &self,
        report: &mut SyncReport,
        run: Option<u64>,
    ) -> Result<(), StorageError> {
        let kind = T::KIND;
        let pending = self.store.get_unsynced_revisions::<T>(None)?;
        if pending.is_empty() {
            return Ok(());
        }
        tracing::debug!("Pushing {} unsynced {}", pending.len(), kind);

        for (record, revision) in pending {
            if self.interrupted(run) {
                report.interrupted = true;
                return Ok(());
            }

            let id = record.id();
            let document = match record.remote_document() {
                Ok(document) => document,
                Err(e) => {
                    report.failed += 1;
                    self.note(kind, Some(id), e.to_string());
                    continue;
                }
            };

            match self
                .remote
                .create(kind.remote_collection(), &id.to_string(), document)
                .await
            {
                Ok(()) => match self.store.mark_synced_at_revision(kind, id, revision) {
                    Ok(true) => {
                        report.pushed += 1;
                        tracing::debug!("Synced {} {}", kind, id);
                    }
                    Ok(false) => {
                        report.superseded += 1;
                        tracing::debug!("{} {} changed during push, keeping it pending", kind, id);
                    }
                    Err(e) => {
                        report.failed += 1;
                        tracing::error!("Marking {} {} synced failed: {}", kind, id, e);
                        self.note(kind, Some(id), e.to_string());
                    }
                },
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!("Push of {} {} failed: {}", kind, id, e);
                    self.note(kind, Some(id), e.to_string());
                }
            }
        }
        Ok(())
    }

    async fn upload_media(
        &self,
        report: &mut SyncReport,
        run: Option<u64>,
    ) -> Result<(), StorageError> {
        let pending = self.store.pending_media(self.settings.media_batch_size)?;

        for blob in pending {
            if self.interrupted(run) {
                report.interrupted = true;
                return Ok(());
            }

            let path = media_path(&blob);
            match self.media.upload(&blob.data, &path).await {
                Ok(url) => match self.attach_media_url(blob.activity_id, &url) {
                    Ok(()) => {
                        report.media_uploaded += 1;
                        tracing::debug!("Uploaded media for activity {}", blob.activity_id);
                    }
                    Err(e) => {
                        report.media_failed += 1;
                        tracing::error!("Recording media URL failed: {}", e);
                        self.note(EntityKind::Activities, Some(blob.activity_id), e.to_string());
                    }
                },
                Err(e) => {
                    report.media_failed += 1;
                    tracing::warn!("Media upload for {} failed: {}", blob.activity_id, e);
                    self.note(EntityKind::Activities, Some(blob.activity_id), e.to_string());
                }
            }
        }
        Ok(())
    }

    /// Store the uploaded URL and flag the activity so the patch is pushed.
    fn attach_media_url(&self, activity_id: Uuid, url: &str) -> Result<(), StorageError> {
        self.store.mark_media_uploaded(activity_id, url)?;

        if let Some(mut record) = self.store.get::<ActivityRecord>(activity_id)? {
            if let Some(media) = record.media.as_mut() {
                media.url = Some(url.to_string());
            }
            record.envelope.mark_dirty();
            self.store.update(&record)?;
        }
        Ok(())
    }
}

/// Remote path for an activity's media.
fn media_path(blob: &MediaBlob) -> String {
    format!(
        "activities/{}/{}/{}",
        blob.owner_id, blob.activity_id, blob.file_name
    )
}

/// Sync engine errors.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Sync engine already running")]
    AlreadyRunning,

    #[error("No tokio runtime available to run the sync loop")]
    NoRuntime,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}
