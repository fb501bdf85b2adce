//! Achievement unlocks.
//!
//! Unlock ids are UUID v5 of (owner, key), so the primary key enforces
//! write-once even across devices.

use super::ProgressError;
use crate::account::UserAggregate;
use crate::clock::Clock;
use crate::storage::{EntityKind, Envelope, IndexQuery, LocalStore, Record, StorageError};
use crate::sync::SyncHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// What unlocks an achievement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AchievementCondition {
    /// Activities logged, attempts included
    TotalActivities(u32),
    Streak(u32),
    Level(u32),
}

impl AchievementCondition {
    pub fn is_met(&self, user: &UserAggregate) -> bool {
        match *self {
            AchievementCondition::TotalActivities(n) => user.total_activities >= n,
            AchievementCondition::Streak(n) => user.streak >= n,
            AchievementCondition::Level(n) => user.level >= n,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AchievementDefinition {
    pub key: &'static str,
    pub title: &'static str,
    pub condition: AchievementCondition,
}

/// Built-in achievements, evaluated after every award.
pub const ACHIEVEMENTS: &[AchievementDefinition] = &[
    AchievementDefinition {
        key: "first_activity",
        title: "First Steps",
        condition: AchievementCondition::TotalActivities(1),
    },
    AchievementDefinition {
        key: "ten_activities",
        title: "Getting Into It",
        condition: AchievementCondition::TotalActivities(10),
    },
    AchievementDefinition {
        key: "fifty_activities",
        title: "Devoted Caregiver",
        condition: AchievementCondition::TotalActivities(50),
    },
    AchievementDefinition {
        key: "streak_3",
        title: "Three in a Row",
        condition: AchievementCondition::Streak(3),
    },
    AchievementDefinition {
        key: "streak_7",
        title: "Full Week",
        condition: AchievementCondition::Streak(7),
    },
    AchievementDefinition {
        key: "level_5",
        title: "Level 5",
        condition: AchievementCondition::Level(5),
    },
];

/// Record id of an owner's unlock for `key`.
pub fn unlock_id(owner_id: Uuid, key: &str) -> Uuid {
    Uuid::new_v5(&owner_id, key.as_bytes())
}

/// A write-once achievement unlock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementUnlock {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub key: String,
    pub title: String,
    pub unlocked_at: DateTime<Utc>,
}

impl AchievementUnlock {
    pub fn new(owner_id: Uuid, definition: &AchievementDefinition, now: DateTime<Utc>) -> Self {
        Self {
            envelope: Envelope::with_id(unlock_id(owner_id, definition.key), owner_id),
            key: definition.key.to_string(),
            title: definition.title.to_string(),
            unlocked_at: now,
        }
    }
}

impl Record for AchievementUnlock {
    const KIND: EntityKind = EntityKind::Achievements;

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.unlocked_at
    }
}

/// Checks the aggregate against the achievement table.
#[derive(Clone)]
pub struct AchievementTracker {
    store: LocalStore,
    clock: Arc<dyn Clock>,
    sync: Option<SyncHandle>,
}

impl AchievementTracker {
    pub fn new(store: LocalStore, clock: Arc<dyn Clock>, sync: Option<SyncHandle>) -> Self {
        Self { store, clock, sync }
    }

    /// Write unlocks for every met condition. Returns only new unlocks.
    pub fn evaluate(&self, user: &UserAggregate) -> Result<Vec<AchievementUnlock>, ProgressError> {
        let owner_id = user.owner_id();
        let now = self.clock.now();
        let mut unlocked = Vec::new();

        for definition in ACHIEVEMENTS.iter().filter(|d| d.condition.is_met(user)) {
            let unlock = AchievementUnlock::new(owner_id, definition, now);
            match self.store.create(&unlock) {
                Ok(()) => {
                    tracing::info!("{} unlocked achievement {}", owner_id, definition.key);
                    unlocked.push(unlock);
                }
                Err(StorageError::DuplicateId { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }

        if !unlocked.is_empty() {
            if let Some(sync) = &self.sync {
                sync.record_written(EntityKind::Achievements);
            }
        }
        Ok(unlocked)
    }

    /// Unlocks for an owner, oldest first.
    pub fn unlocked(&self, owner_id: Uuid) -> Result<Vec<AchievementUnlock>, ProgressError> {
        Ok(self
            .store
            .query_by_index(IndexQuery::Owner(owner_id), None)?)
    }
}
