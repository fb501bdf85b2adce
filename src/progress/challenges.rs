//! Time-boxed challenges with a completion bonus.

use super::ProgressError;
use crate::activities::ActivityRecord;
use crate::clock::Clock;
use crate::points::{ActivityCategory, PointsEngine};
use crate::storage::{EntityKind, Envelope, IndexQuery, LocalStore, Record};
use crate::sync::SyncHandle;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// What a challenge counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeMetric {
    /// Qualifying activities
    Activities,
    /// Completed minutes
    Minutes,
    /// Points awarded
    Points,
}

impl ChallengeMetric {
    /// How far one activity moves a challenge measured by this metric.
    pub fn contribution(&self, activity: &ActivityRecord) -> u32 {
        match self {
            ChallengeMetric::Activities => u32::from(activity.qualifying),
            ChallengeMetric::Minutes => activity.minutes(),
            ChallengeMetric::Points => activity.points_awarded,
        }
    }
}

/// A challenge a caregiver can opt into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeDefinition {
    pub id: String,
    pub title: String,
    pub metric: ChallengeMetric,
    /// Only activities of this kind count
    pub activity_kind: Option<String>,
    /// Only activities in this category count
    pub category: Option<ActivityCategory>,
    pub target: u32,
    pub bonus_points: u32,
    /// Days from start until the challenge expires; `None` never expires
    pub duration_days: Option<u32>,
}

impl ChallengeDefinition {
    pub fn new(
        id: &str,
        title: &str,
        metric: ChallengeMetric,
        target: u32,
        bonus_points: u32,
    ) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            metric,
            activity_kind: None,
            category: None,
            target,
            bonus_points,
            duration_days: None,
        }
    }

    pub fn for_kind(mut self, activity_kind: &str) -> Self {
        self.activity_kind = Some(activity_kind.to_string());
        self
    }

    pub fn for_category(mut self, category: ActivityCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn lasting_days(mut self, days: u32) -> Self {
        self.duration_days = Some(days);
        self
    }

    /// Built-in challenges.
    pub fn builtin() -> Vec<ChallengeDefinition> {
        vec![
            ChallengeDefinition::new(
                "reading_week",
                "Read for an hour this week",
                ChallengeMetric::Minutes,
                60,
                20,
            )
            .for_kind("reading")
            .lasting_days(7),
            ChallengeDefinition::new(
                "busy_week",
                "Log ten activities this week",
                ChallengeMetric::Activities,
                10,
                25,
            )
            .lasting_days(7),
            ChallengeDefinition::new(
                "outdoor_month",
                "Eight outdoor outings",
                ChallengeMetric::Activities,
                8,
                40,
            )
            .for_category(ActivityCategory::Outdoor)
            .lasting_days(30),
            ChallengeDefinition::new("century", "Earn 100 points", ChallengeMetric::Points, 100, 15),
        ]
    }
}

/// An owner's progress on one challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeProgress {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub challenge_id: String,
    pub title: String,
    pub metric: ChallengeMetric,
    pub activity_kind: Option<String>,
    pub category: Option<ActivityCategory>,
    pub target: u32,
    /// Never exceeds `target`
    pub current: u32,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub bonus_points: u32,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ChallengeProgress {
    pub fn start(owner_id: Uuid, definition: &ChallengeDefinition, now: DateTime<Utc>) -> Self {
        Self {
            envelope: Envelope::new(owner_id),
            challenge_id: definition.id.clone(),
            title: definition.title.clone(),
            metric: definition.metric,
            activity_kind: definition.activity_kind.clone(),
            category: definition.category,
            target: definition.target,
            current: 0,
            completed: false,
            completed_at: None,
            bonus_points: definition.bonus_points,
            started_at: now,
            expires_at: definition
                .duration_days
                .map(|days| now + Duration::days(i64::from(days))),
        }
    }

    pub fn is_expired(&self, at: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| at >= expiry)
    }

    /// Still collecting progress at `at`.
    pub fn is_active(&self, at: DateTime<Utc>) -> bool {
        !self.completed && !self.is_expired(at)
    }

    /// Whether an activity passes the kind and category filters.
    pub fn matches(&self, activity: &ActivityRecord) -> bool {
        self.activity_kind
            .as_deref()
            .map_or(true, |kind| kind == activity.activity_kind)
            && self.category.map_or(true, |c| c == activity.category)
    }

    /// Fraction complete in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        if self.target == 0 {
            return 1.0;
        }
        f64::from(self.current) / f64::from(self.target)
    }

    /// Add progress. Returns `true` if this completed the challenge.
    fn advance(&mut self, amount: u32, now: DateTime<Utc>) -> bool {
        self.current = self.current.saturating_add(amount).min(self.target);
        self.envelope.mark_dirty();
        if self.current >= self.target {
            self.completed = true;
            self.completed_at = Some(now);
            return true;
        }
        false
    }
}

impl Record for ChallengeProgress {
    const KIND: EntityKind = EntityKind::ChallengeProgress;

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// Starts challenges and moves them forward as activities come in.
#[derive(Clone)]
pub struct ChallengeTracker {
    store: LocalStore,
    points: PointsEngine,
    clock: Arc<dyn Clock>,
    sync: Option<SyncHandle>,
}

impl ChallengeTracker {
    pub fn new(
        store: LocalStore,
        points: PointsEngine,
        clock: Arc<dyn Clock>,
        sync: Option<SyncHandle>,
    ) -> Self {
        Self {
            store,
            points,
            clock,
            sync,
        }
    }

    /// Opt an owner into a challenge.
    ///
    /// Fails if the same challenge is already active for the owner.
    pub fn start_challenge(
        &self,
        owner_id: Uuid,
        definition: &ChallengeDefinition,
    ) -> Result<ChallengeProgress, ProgressError> {
        let now = self.clock.now();
        if self
            .active(owner_id)?
            .iter()
            .any(|p| p.challenge_id == definition.id)
        {
            return Err(ProgressError::AlreadyActive(definition.id.clone()));
        }

        let progress = ChallengeProgress::start(owner_id, definition, now);
        self.store.create(&progress)?;
        self.notify();

        tracing::info!("{} started challenge {}", owner_id, definition.id);
        Ok(progress)
    }

    /// Every challenge the owner has started, oldest first.
    pub fn list(&self, owner_id: Uuid) -> Result<Vec<ChallengeProgress>, ProgressError> {
        Ok(self
            .store
            .query_by_index(IndexQuery::Owner(owner_id), None)?)
    }

    /// Challenges still collecting progress.
    pub fn active(&self, owner_id: Uuid) -> Result<Vec<ChallengeProgress>, ProgressError> {
        let now = self.clock.now();
        Ok(self
            .list(owner_id)?
            .into_iter()
            .filter(|p| p.is_active(now))
            .collect())
    }

    /// Apply a saved activity to the owner's active challenges.
    ///
    /// Completing a challenge credits its bonus. Returns the challenges
    /// completed by this activity.
    pub fn record_activity(
        &self,
        activity: &ActivityRecord,
    ) -> Result<Vec<ChallengeProgress>, ProgressError> {
        let owner_id = activity.owner_id();
        let mut completed = Vec::new();
        let mut changed = false;

        for mut progress in self.list(owner_id)? {
            if !progress.is_active(activity.created_at) || !progress.matches(activity) {
                continue;
            }
            let amount = progress.metric.contribution(activity);
            if amount == 0 {
                continue;
            }

            let finished = progress.advance(amount, self.clock.now());
            self.store.update(&progress)?;
            changed = true;

            if finished {
                if progress.bonus_points > 0 {
                    self.points.grant_bonus(owner_id, progress.bonus_points)?;
                }
                tracing::info!(
                    "{} completed challenge {} (+{} bonus)",
                    owner_id,
                    progress.challenge_id,
                    progress.bonus_points
                );
                completed.push(progress);
            }
        }

        if changed {
            self.notify();
        }
        Ok(completed)
    }

    fn notify(&self) {
        if let Some(sync) = &self.sync {
            sync.record_written(EntityKind::ChallengeProgress);
        }
    }
}
