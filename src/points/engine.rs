//! Points and leveling engine.
//!
//! Point calculation is a pure function of the activity kind, the duration
//! and the owner's same-day history for that kind. The engine wraps it with
//! the store reads needed to build that history and with the user-aggregate
//! mutations that follow an award.

use crate::account::UserAggregate;
use crate::activities::ActivityRecord;
use crate::clock::{calendar_day, day_window_at, Clock, DayZone};
use crate::points::catalog::{ActivityCatalog, ActivityDefinition, PointRule};
use crate::storage::{IndexQuery, LocalStore, Record, StorageError};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Points per level.
pub const POINTS_PER_LEVEL: u32 = 100;

/// Level for a point balance: `floor(points / 100) + 1`.
pub fn level_for_points(points: u32) -> u32 {
    points / POINTS_PER_LEVEL + 1
}

/// Whether `duration_seconds` meets the kind's minimum.
pub fn is_qualifying(definition: &ActivityDefinition, duration_seconds: u32) -> bool {
    match definition.rule {
        PointRule::RateCapped { min_minutes, .. } => duration_seconds / 60 >= min_minutes,
        PointRule::FlatDaily { .. } | PointRule::Fixed { .. } => true,
    }
}

/// Points already credited today for this kind.
fn earned_today(definition: &ActivityDefinition, history: &[ActivityRecord]) -> u32 {
    history
        .iter()
        .filter(|r| r.activity_kind == definition.id)
        .map(|r| r.points_awarded)
        .fold(0u32, u32::saturating_add)
}

/// Points a new submission earns given the same-day `history`.
///
/// Records of other kinds in `history` are ignored.
pub fn calculate_points(
    definition: &ActivityDefinition,
    duration_seconds: u32,
    history: &[ActivityRecord],
) -> u32 {
    match definition.rule {
        PointRule::RateCapped {
            points_per_minute,
            min_minutes,
            daily_cap,
        } => {
            let minutes = duration_seconds / 60;
            if minutes < min_minutes {
                return 0;
            }
            let remaining = daily_cap.saturating_sub(earned_today(definition, history));
            minutes.saturating_mul(points_per_minute).min(remaining)
        }
        PointRule::FlatDaily { points } => {
            let already_awarded = history
                .iter()
                .any(|r| r.activity_kind == definition.id && r.points_awarded > 0);
            if already_awarded {
                0
            } else {
                points
            }
        }
        PointRule::Fixed { points } => points,
    }
}

/// Result of [`PointsEngine::check_daily_limit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyLimit {
    /// Whether another submission today can still earn points
    pub can_earn: bool,
    /// Points left under the cap; `None` for uncapped kinds
    pub remaining_points: Option<u32>,
    /// Points already credited today
    pub earned_today: u32,
}

/// An award to apply to the user aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Award {
    pub points: u32,
    /// Whether the activity counts towards the streak
    pub qualifying: bool,
    /// When the activity happened
    pub at: DateTime<Utc>,
}

/// Computes awards and applies them to the user aggregate.
#[derive(Clone)]
pub struct PointsEngine {
    store: LocalStore,
    catalog: Arc<ActivityCatalog>,
    clock: Arc<dyn Clock>,
    zone: DayZone,
}

impl PointsEngine {
    pub fn new(
        store: LocalStore,
        catalog: Arc<ActivityCatalog>,
        clock: Arc<dyn Clock>,
        zone: DayZone,
    ) -> Self {
        Self {
            store,
            catalog,
            clock,
            zone,
        }
    }

    pub fn catalog(&self) -> &ActivityCatalog {
        &self.catalog
    }

    pub fn zone(&self) -> DayZone {
        self.zone
    }

    /// Current calendar day in the engine's zone.
    pub fn today(&self) -> NaiveDate {
        calendar_day(self.clock.now(), self.zone)
    }

    /// Look up a kind, failing on ids missing from the catalog.
    pub fn definition(&self, activity_kind: &str) -> Result<&ActivityDefinition, PointsError> {
        self.catalog
            .get(activity_kind)
            .ok_or_else(|| PointsError::UnknownActivity(activity_kind.to_string()))
    }

    /// The owner's activities of one kind on the calendar day containing `at`.
    pub fn day_history(
        &self,
        owner_id: Uuid,
        activity_kind: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<ActivityRecord>, PointsError> {
        let (from, to) = day_window_at(at, self.zone);
        let records: Vec<ActivityRecord> = self.store.query_by_index(
            IndexQuery::OwnerTimeRange {
                owner: owner_id,
                from,
                to,
            },
            None,
        )?;

        Ok(records
            .into_iter()
            .filter(|r| r.activity_kind == activity_kind)
            .collect())
    }

    /// How much more the owner can earn from `activity_kind` today.
    pub fn check_daily_limit(
        &self,
        owner_id: Uuid,
        activity_kind: &str,
    ) -> Result<DailyLimit, PointsError> {
        let definition = self.definition(activity_kind)?;
        let history = self.day_history(owner_id, activity_kind, self.clock.now())?;
        let earned = earned_today(definition, &history);

        let limit = match definition.rule.daily_cap() {
            Some(cap) => {
                let remaining = cap.saturating_sub(earned);
                DailyLimit {
                    can_earn: remaining > 0,
                    remaining_points: Some(remaining),
                    earned_today: earned,
                }
            }
            None => DailyLimit {
                can_earn: true,
                remaining_points: None,
                earned_today: earned,
            },
        };
        Ok(limit)
    }

    /// Credit an activity award to the owner's aggregate.
    ///
    /// Adds the points, re-derives the level, counts the activity and moves
    /// the streak on the first qualifying activity of the day.
    pub fn apply_award(&self, owner_id: Uuid, award: Award) -> Result<UserAggregate, PointsError> {
        let mut user: UserAggregate = self.store.require(owner_id)?;
        self.credit(&mut user, award);
        self.store.update(&user)?;
        Ok(user)
    }

    /// Apply an award to an aggregate the caller will persist, e.g. inside
    /// a store transaction.
    pub fn credit(&self, user: &mut UserAggregate, award: Award) {
        user.add_points(award.points);
        user.total_activities = user.total_activities.saturating_add(1);
        if award.qualifying {
            user.register_qualifying_day(calendar_day(award.at, self.zone));
        }
        user.touch(self.clock.now());

        tracing::debug!(
            "Awarded {} points to {} (total {}, level {}, streak {})",
            award.points,
            user.owner_id(),
            user.points,
            user.level,
            user.streak
        );
    }

    /// Credit bonus points without counting an activity.
    pub fn grant_bonus(&self, owner_id: Uuid, points: u32) -> Result<UserAggregate, PointsError> {
        let mut user: UserAggregate = self.store.require(owner_id)?;
        user.add_points(points);
        user.touch(self.clock.now());
        self.store.update(&user)?;

        tracing::debug!("Granted {} bonus points to {}", points, owner_id);
        Ok(user)
    }
}

/// Points engine errors.
#[derive(Debug, Error)]
pub enum PointsError {
    #[error("Unknown activity kind: {0}")]
    UnknownActivity(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
