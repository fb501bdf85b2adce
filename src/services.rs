//! Wiring of the domain services around one store.

use crate::account::AccountService;
use crate::activities::ActivityService;
use crate::assessments::AssessmentService;
use crate::clock::{Clock, DayZone};
use crate::points::{ActivityCatalog, PointsEngine};
use crate::progress::{AchievementTracker, ChallengeTracker};
use crate::rewards::RewardService;
use crate::storage::LocalStore;
use crate::sync::SyncHandle;
use std::sync::Arc;

/// Every domain service, sharing one store, clock and sync handle.
#[derive(Clone)]
pub struct AppServices {
    pub store: LocalStore,
    pub points: PointsEngine,
    pub accounts: AccountService,
    pub activities: ActivityService,
    pub assessments: AssessmentService,
    pub rewards: RewardService,
    pub challenges: ChallengeTracker,
    pub achievements: AchievementTracker,
}

impl AppServices {
    /// Build with the built-in activity catalog.
    pub fn new(
        store: LocalStore,
        clock: Arc<dyn Clock>,
        zone: DayZone,
        sync: Option<SyncHandle>,
    ) -> Self {
        Self::with_catalog(store, clock, zone, ActivityCatalog::builtin(), sync)
    }

    pub fn with_catalog(
        store: LocalStore,
        clock: Arc<dyn Clock>,
        zone: DayZone,
        catalog: ActivityCatalog,
        sync: Option<SyncHandle>,
    ) -> Self {
        let points = PointsEngine::new(store.clone(), Arc::new(catalog), clock.clone(), zone);
        let challenges =
            ChallengeTracker::new(store.clone(), points.clone(), clock.clone(), sync.clone());
        let achievements = AchievementTracker::new(store.clone(), clock.clone(), sync.clone());

        Self {
            accounts: AccountService::new(store.clone(), clock.clone(), sync.clone()),
            activities: ActivityService::new(
                store.clone(),
                points.clone(),
                challenges.clone(),
                achievements.clone(),
                clock.clone(),
                sync.clone(),
            ),
            assessments: AssessmentService::new(store.clone(), clock.clone(), sync.clone()),
            rewards: RewardService::new(store.clone(), clock, sync),
            challenges,
            achievements,
            points,
            store,
        }
    }
}
