//! Activity logging.

use super::types::{ActivityRecord, MediaAttachment, NewActivity};
use crate::account::UserAggregate;
use crate::clock::{day_window, Clock};
use crate::points::{calculate_points, is_qualifying, Award, PointsEngine, PointsError};
use crate::progress::{AchievementTracker, ChallengeTracker};
use crate::storage::{
    EntityKind, Envelope, IndexQuery, LocalStore, MediaBlob, Record, StorageError,
};
use crate::sync::SyncHandle;
use chrono::NaiveDate;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Records activities and credits their points.
#[derive(Clone)]
pub struct ActivityService {
    store: LocalStore,
    points: PointsEngine,
    challenges: ChallengeTracker,
    achievements: AchievementTracker,
    clock: Arc<dyn Clock>,
    sync: Option<SyncHandle>,
}

impl ActivityService {
    pub fn new(
        store: LocalStore,
        points: PointsEngine,
        challenges: ChallengeTracker,
        achievements: AchievementTracker,
        clock: Arc<dyn Clock>,
        sync: Option<SyncHandle>,
    ) -> Self {
        Self {
            store,
            points,
            challenges,
            achievements,
            clock,
            sync,
        }
    }

    /// Log an activity.
    ///
    /// Points are computed against the owner's same-day history; the record,
    /// any media blob and the award commit in one store transaction; then
    /// sync is poked. The
    /// call never waits on the network. Durations below the kind's minimum
    /// are kept as zero-point attempts.
    pub fn save_activity(&self, input: NewActivity) -> Result<ActivityRecord, ActivityError> {
        let definition = self.points.definition(&input.activity_kind)?.clone();
        let owner_id = input.owner_id;

        let now = self.clock.now();
        let history = self.points.day_history(owner_id, &definition.id, now)?;
        let points_awarded = calculate_points(&definition, input.duration_seconds, &history);
        let qualifying = is_qualifying(&definition, input.duration_seconds);

        let record = ActivityRecord {
            envelope: Envelope::new(owner_id),
            activity_kind: definition.id.clone(),
            category: definition.category,
            duration_seconds: input.duration_seconds,
            points_awarded,
            qualifying,
            notes: input.notes,
            media: input.media.as_ref().map(|m| MediaAttachment {
                file_name: m.file_name.clone(),
                content_type: m.content_type.clone(),
                size_bytes: m.data.len() as u64,
                url: None,
            }),
            created_at: now,
        };

        // Record, blob and award commit together or not at all.
        let user = self.store.transaction(|txn| {
            txn.create(&record)?;

            if let Some(media) = input.media {
                txn.put_media_blob(&MediaBlob {
                    activity_id: record.id(),
                    owner_id,
                    file_name: media.file_name,
                    content_type: media.content_type,
                    data: media.data,
                    remote_url: None,
                    created_at: now,
                })?;
            }

            let mut user: UserAggregate = txn
                .get(owner_id)?
                .ok_or(ActivityError::NotSignedIn(owner_id))?;
            self.points.credit(
                &mut user,
                Award {
                    points: points_awarded,
                    qualifying,
                    at: now,
                },
            );
            txn.update(&user)?;
            Ok::<_, ActivityError>(user)
        })?;

        tracing::info!(
            "Logged {} for {}: {}s, {} points{}",
            definition.id,
            owner_id,
            input.duration_seconds,
            points_awarded,
            if qualifying { "" } else { " (attempt)" }
        );

        self.update_progress(&record, user);

        if let Some(sync) = &self.sync {
            sync.record_written(EntityKind::Activities);
        }
        Ok(record)
    }

    /// Challenges and achievements. The activity is already committed, so
    /// failures here are logged rather than returned.
    fn update_progress(&self, record: &ActivityRecord, user: UserAggregate) {
        let user = match self.challenges.record_activity(record) {
            Ok(completed) if !completed.is_empty() => {
                match self.store.get::<UserAggregate>(record.owner_id()) {
                    Ok(Some(updated)) => updated,
                    _ => user,
                }
            }
            Ok(_) => user,
            Err(e) => {
                tracing::error!("Challenge update for {} failed: {}", record.id(), e);
                user
            }
        };

        if let Err(e) = self.achievements.evaluate(&user) {
            tracing::error!("Achievement check for {} failed: {}", record.owner_id(), e);
        }
    }

    pub fn get(&self, id: Uuid) -> Result<Option<ActivityRecord>, ActivityError> {
        Ok(self.store.get(id)?)
    }

    /// Most recent activities for an owner, newest first.
    pub fn recent(
        &self,
        owner_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ActivityRecord>, ActivityError> {
        let mut records: Vec<ActivityRecord> =
            self.store.query_by_index(IndexQuery::Owner(owner_id), None)?;
        records.reverse();
        records.truncate(limit);
        Ok(records)
    }

    /// Activities on one calendar day, oldest first.
    pub fn on_day(
        &self,
        owner_id: Uuid,
        day: NaiveDate,
    ) -> Result<Vec<ActivityRecord>, ActivityError> {
        let (from, to) = day_window(day, self.points.zone());
        Ok(self.store.query_by_index(
            IndexQuery::OwnerTimeRange {
                owner: owner_id,
                from,
                to,
            },
            None,
        )?)
    }
}

/// Activity logging errors.
#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("No user aggregate for {0}; sign in first")]
    NotSignedIn(Uuid),

    #[error(transparent)]
    Points(#[from] PointsError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
